use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::ResolveError;
use crate::registry::ResourceRegistry;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Computes the set of groups implied by loading or unloading one group.
pub struct DependencyResolver;

impl DependencyResolver {
    /// The closure of `root` and every group it transitively depends on,
    /// dependency-first.
    ///
    /// Siblings keep the order they are declared in. `root` is always last.
    pub fn expand(registry: &ResourceRegistry, root: &str) -> Result<Vec<String>, ResolveError> {
        if !registry.contains(root) {
            return Err(ResolveError::UnknownGroup(root.to_owned()));
        }
        let mut marks = HashMap::new();
        let mut path = Vec::new();
        let mut order = Vec::new();
        visit(registry, root, &mut marks, &mut path, &mut order)?;
        Ok(order)
    }

    /// Every registered group that transitively depends on `root`, in
    /// registration order. `root` itself is not included.
    pub fn dependents(registry: &ResourceRegistry, root: &str) -> Vec<String> {
        let mut reverse: HashMap<&str, Vec<&str>> = HashMap::new();
        for group in registry.iter() {
            for dependency in group.dependencies() {
                reverse
                    .entry(dependency.as_str())
                    .or_default()
                    .push(group.name());
            }
        }

        let mut found: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(name) = queue.pop_front() {
            for &dependent in reverse.get(name).into_iter().flatten() {
                if dependent != root && found.insert(dependent) {
                    queue.push_back(dependent);
                }
            }
        }

        registry
            .iter()
            .filter(|g| found.contains(g.name()))
            .map(|g| g.name().to_owned())
            .collect()
    }
}

fn visit<'a>(
    registry: &'a ResourceRegistry,
    name: &'a str,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
    order: &mut Vec<String>,
) -> Result<(), ResolveError> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => {
            let start = path.iter().position(|&n| n == name).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|&n| n.to_owned()).collect();
            cycle.push(name.to_owned());
            return Err(ResolveError::CyclicDependency { cycle });
        }
        None => {}
    }

    // Callers only pass registered names; dependencies are checked below.
    let Some(group) = registry.group(name) else {
        return Err(ResolveError::UnknownGroup(name.to_owned()));
    };

    marks.insert(name, Mark::InProgress);
    path.push(name);
    for dependency in group.dependencies() {
        if !registry.contains(dependency) {
            return Err(ResolveError::UnknownDependency {
                group: name.to_owned(),
                dependency: dependency.clone(),
            });
        }
        visit(registry, dependency, marks, path, order)?;
    }
    path.pop();
    marks.insert(name, Mark::Done);
    order.push(name.to_owned());
    Ok(())
}
