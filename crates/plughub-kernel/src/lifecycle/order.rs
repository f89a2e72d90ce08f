//! Dependency ordering of plugins.

use std::collections::HashMap;

use plughub_core::error::KernelError;
use plughub_core::result::KernelResult;

/// Groups plugins into dependency levels.
///
/// Level 0 holds plugins with no known dependencies; every other plugin sits
/// one level above its deepest dependency. Within a level, input order is
/// kept. Dependencies on names absent from `nodes` are ignored here and
/// reported when the plugin is initialized.
pub(crate) fn dependency_levels(nodes: &[(String, Vec<String>)]) -> KernelResult<Vec<Vec<String>>> {
    let graph: HashMap<&str, &[String]> = nodes
        .iter()
        .map(|(name, deps)| (name.as_str(), deps.as_slice()))
        .collect();

    let mut levels: HashMap<&str, usize> = HashMap::new();
    let mut visiting: Vec<&str> = Vec::new();

    for (name, _) in nodes {
        visit(name, &graph, &mut levels, &mut visiting)?;
    }

    let depth = levels.values().copied().max().map_or(0, |max| max + 1);
    let mut grouped = vec![Vec::new(); depth];
    for (name, _) in nodes {
        grouped[levels[name.as_str()]].push(name.clone());
    }
    Ok(grouped)
}

/// Flattens [`dependency_levels`] into one topological order.
pub(crate) fn topological_order(nodes: &[(String, Vec<String>)]) -> KernelResult<Vec<String>> {
    Ok(dependency_levels(nodes)?.into_iter().flatten().collect())
}

fn visit<'a>(
    name: &'a str,
    graph: &HashMap<&'a str, &'a [String]>,
    levels: &mut HashMap<&'a str, usize>,
    visiting: &mut Vec<&'a str>,
) -> KernelResult<usize> {
    if let Some(&level) = levels.get(name) {
        return Ok(level);
    }

    if let Some(start) = visiting.iter().position(|n| *n == name) {
        let mut cycle: Vec<String> = visiting[start..].iter().map(|n| n.to_string()).collect();
        cycle.push(name.to_string());
        return Err(KernelError::CircularDependency { cycle });
    }

    visiting.push(name);
    let mut level = 0;
    for dep in graph.get(name).copied().unwrap_or_default() {
        if graph.contains_key(dep.as_str()) {
            level = level.max(visit(dep, graph, levels, visiting)? + 1);
        }
    }
    visiting.pop();

    levels.insert(name, level);
    Ok(level)
}
