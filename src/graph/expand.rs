//! Job-to-node expansion.

use crate::model::{PlaceId, ProblemModel, TaskSpec};

/// What a node stands for in the routing graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// A worker hub; no tasks, no window.
    Hub,
    /// A job's head node: all required tasks plus the arrival window.
    JobHead,
    /// One optional task of a job; always skippable.
    OptionalTask,
}

/// A visitable unit in the routing graph.
///
/// Node ids are consecutive integers starting at 0, in expansion order:
/// hubs first, then each job's head node followed by its optional-task
/// nodes in ascending task order. Tasks are value copies of the validated
/// specs; the window is in whole seconds relative to T₀.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: usize,
    pub place: PlaceId,
    pub role: NodeRole,
    pub tasks: Vec<TaskSpec>,
    pub window: Option<(i64, i64)>,
    pub skippable: bool,
}

impl Node {
    /// Order of the first task at this node, if it has any.
    ///
    /// Head nodes report the lowest required order; optional-task nodes
    /// report their single task's order. Drives precedence checks.
    pub fn first_task_order(&self) -> Option<u32> {
        self.tasks.first().map(|t| t.order)
    }
}

/// Expands the validated model into the ordered node list.
pub fn expand_nodes(model: &ProblemModel) -> Vec<Node> {
    let mut nodes = Vec::new();

    for (place, _) in model.hubs() {
        nodes.push(Node {
            id: nodes.len(),
            place,
            role: NodeRole::Hub,
            tasks: Vec::new(),
            window: None,
            skippable: false,
        });
    }

    for (place, _, detail) in model.jobs() {
        let open = model.seconds_since_t_zero(detail.open);
        let close = model.seconds_since_t_zero(detail.close);

        let required: Vec<TaskSpec> = detail
            .tasks
            .iter()
            .filter(|t| !t.optional)
            .cloned()
            .collect();
        // The head node inherits the job's optional flag as its skippable bit.
        nodes.push(Node {
            id: nodes.len(),
            place,
            role: NodeRole::JobHead,
            tasks: required,
            window: Some((open, close)),
            skippable: detail.optional,
        });

        for task in detail.tasks.iter().filter(|t| t.optional) {
            nodes.push(Node {
                id: nodes.len(),
                place,
                role: NodeRole::OptionalTask,
                tasks: vec![task.clone()],
                window: None,
                skippable: true,
            });
        }
    }

    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::input::TaskInput;
    use crate::model::validate;
    use crate::test_utils::{base_problem, task_input};

    fn two_task_model() -> crate::model::ProblemModel {
        let mut input = base_problem();
        input.jobs.as_mut().unwrap()[0].tasks = Some(vec![
            task_input("tighten", "wrench", false, vec![]),
            task_input("polish", "wrench", true, vec![]),
            task_input("inspect", "wrench", true, vec![]),
        ]);
        validate(&input).unwrap()
    }

    #[test]
    fn ids_are_consecutive_from_zero() {
        let nodes = expand_nodes(&two_task_model());
        for (i, node) in nodes.iter().enumerate() {
            assert_eq!(node.id, i);
        }
    }

    #[test]
    fn hub_nodes_come_first_and_are_bare() {
        let nodes = expand_nodes(&two_task_model());
        assert_eq!(nodes[0].role, NodeRole::Hub);
        assert!(nodes[0].tasks.is_empty());
        assert!(nodes[0].window.is_none());
        assert!(!nodes[0].skippable);
    }

    #[test]
    fn job_expands_to_head_plus_optional_nodes() {
        let nodes = expand_nodes(&two_task_model());
        // 1 hub + 1 head + 2 optional-task nodes
        assert_eq!(nodes.len(), 4);

        let head = &nodes[1];
        assert_eq!(head.role, NodeRole::JobHead);
        assert_eq!(head.tasks.len(), 1);
        assert_eq!(head.tasks[0].id, "tighten");
        assert!(head.window.is_some());
        assert!(!head.skippable);

        assert_eq!(nodes[2].role, NodeRole::OptionalTask);
        assert_eq!(nodes[2].tasks[0].id, "polish");
        assert_eq!(nodes[3].tasks[0].id, "inspect");
        assert!(nodes[2].skippable && nodes[3].skippable);
    }

    #[test]
    fn optional_nodes_keep_ascending_task_order() {
        let nodes = expand_nodes(&two_task_model());
        assert_eq!(nodes[2].first_task_order(), Some(2));
        assert_eq!(nodes[3].first_task_order(), Some(3));
    }

    #[test]
    fn optional_job_head_is_skippable() {
        let mut input = base_problem();
        input.jobs.as_mut().unwrap()[0].optional = Some(true);
        let model = validate(&input).unwrap();
        let nodes = expand_nodes(&model);
        assert!(nodes[1].skippable);
    }

    #[test]
    fn window_is_relative_seconds() {
        let mut input = base_problem();
        input.t_zero = Some(crate::test_utils::iso("2026-03-01T08:00:00Z"));
        let model = validate(&input).unwrap();
        let nodes = expand_nodes(&model);
        // Window 08:00–16:00 relative to an 08:00 T₀.
        assert_eq!(nodes[1].window, Some((0, 8 * 3600)));
    }

    #[test]
    fn all_optional_job_has_empty_head() {
        let mut input = base_problem();
        input.jobs.as_mut().unwrap()[0].tasks =
            Some(vec![TaskInput {
                id: Some("extra".into()),
                tool: Some("wrench".into()),
                optional: Some(true),
                rewards: None,
            }]);
        let model = validate(&input).unwrap();
        let nodes = expand_nodes(&model);
        assert_eq!(nodes[1].role, NodeRole::JobHead);
        assert!(nodes[1].tasks.is_empty());
        assert_eq!(nodes[1].first_task_order(), None);
    }
}
