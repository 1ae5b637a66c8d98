//! Input validation for job-shop problems.
//!
//! Checks structural integrity of operation tuples before a graph is
//! built. Detects:
//! - Duplicate `(job_id, operation_id)` keys
//! - Successor references that do not exist within the same job
//! - Jobs without exactly one terminal operation
//! - Circular successor chains
//! - Negative or non-finite template durations
//! - Machine groups missing from the pool
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 22.4 (Topological Sort)

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use crate::models::{MachinePool, OperationSpec};

/// Validation result.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationError {
    /// Error category.
    pub kind: ValidationErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of validation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Two operations share the same `(job_id, operation_id)`.
    DuplicateId,
    /// A successor ID names no operation of the same job.
    InvalidSuccessor,
    /// A job has no terminal operation.
    MissingTerminal,
    /// A job has more than one terminal operation.
    MultipleTerminals,
    /// Successor chain contains a cycle.
    CyclicDependency,
    /// Template duration is negative or not finite.
    InvalidBaseDuration,
    /// An operation requires a group the pool does not have.
    UnknownMachineGroup,
}

impl ValidationError {
    fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

type Key<'a> = (&'a str, u32);

/// Validates operation tuples.
///
/// Checks:
/// 1. No duplicate `(job_id, operation_id)` keys
/// 2. Every non-terminal successor exists within the same job
/// 3. Every job has exactly one terminal operation
/// 4. No circular successor chains
/// 5. Template durations are finite and non-negative
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_operations(specs: &[OperationSpec]) -> ValidationResult {
    let mut errors = Vec::new();

    let mut keys: HashSet<Key> = HashSet::new();
    for spec in specs {
        if !keys.insert((spec.job_id.as_str(), spec.operation_id)) {
            errors.push(ValidationError::new(
                ValidationErrorKind::DuplicateId,
                format!("Duplicate operation: {}", spec.key()),
            ));
        }
        if !spec.base_duration.is_finite() || spec.base_duration < 0.0 {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidBaseDuration,
                format!(
                    "Operation '{}' has invalid base duration {}",
                    spec.key(),
                    spec.base_duration
                ),
            ));
        }
    }

    // Successor references
    for spec in specs {
        if spec.is_terminal() {
            continue;
        }
        let exists = u32::try_from(spec.successor)
            .map(|succ| keys.contains(&(spec.job_id.as_str(), succ)))
            .unwrap_or(false);
        if !exists {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidSuccessor,
                format!(
                    "Operation '{}' references unknown successor {}",
                    spec.key(),
                    spec.successor
                ),
            ));
        }
    }

    // Terminal count per job
    let mut terminals: BTreeMap<&str, usize> = BTreeMap::new();
    for spec in specs {
        let count = terminals.entry(spec.job_id.as_str()).or_insert(0);
        if spec.is_terminal() {
            *count += 1;
        }
    }
    for (job_id, count) in terminals {
        match count {
            0 => errors.push(ValidationError::new(
                ValidationErrorKind::MissingTerminal,
                format!("Job '{job_id}' has no terminal operation"),
            )),
            1 => {}
            n => errors.push(ValidationError::new(
                ValidationErrorKind::MultipleTerminals,
                format!("Job '{job_id}' has {n} terminal operations"),
            )),
        }
    }

    if let Some(cycle_err) = detect_cycles(specs) {
        errors.push(cycle_err);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates that every operation's machine group exists in the pool.
pub fn validate_machine_groups(specs: &[OperationSpec], pool: &MachinePool) -> ValidationResult {
    let errors: Vec<ValidationError> = specs
        .iter()
        .filter(|spec| !pool.has_group(&spec.machine_group))
        .map(|spec| {
            ValidationError::new(
                ValidationErrorKind::UnknownMachineGroup,
                format!(
                    "Operation '{}' requires unknown machine group '{}'",
                    spec.key(),
                    spec.machine_group
                ),
            )
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Detects cycles in the successor graph using DFS.
///
/// # Algorithm
/// Topological sort via DFS. If a back-edge is found (visiting a node
/// currently in the recursion stack), a cycle exists. Roots are visited in
/// input order so the reported operation is deterministic.
fn detect_cycles(specs: &[OperationSpec]) -> Option<ValidationError> {
    let mut adj: HashMap<Key, Vec<Key>> = HashMap::new();
    for spec in specs {
        if let Ok(succ) = u32::try_from(spec.successor) {
            adj.entry((spec.job_id.as_str(), spec.operation_id))
                .or_default()
                .push((spec.job_id.as_str(), succ));
        }
    }

    let mut visited = HashSet::new();
    let mut in_stack = HashSet::new();

    for spec in specs {
        let node = (spec.job_id.as_str(), spec.operation_id);
        if !visited.contains(&node) && has_cycle_dfs(node, &adj, &mut visited, &mut in_stack) {
            return Some(ValidationError::new(
                ValidationErrorKind::CyclicDependency,
                format!("Circular dependency detected involving operation '{}'", spec.key()),
            ));
        }
    }

    None
}

fn has_cycle_dfs<'a>(
    node: Key<'a>,
    adj: &HashMap<Key<'a>, Vec<Key<'a>>>,
    visited: &mut HashSet<Key<'a>>,
    in_stack: &mut HashSet<Key<'a>>,
) -> bool {
    visited.insert(node);
    in_stack.insert(node);

    if let Some(neighbors) = adj.get(&node) {
        for &next in neighbors {
            if in_stack.contains(&next) {
                return true; // Back edge → cycle
            }
            if !visited.contains(&next) && has_cycle_dfs(next, adj, visited, in_stack) {
                return true;
            }
        }
    }

    in_stack.remove(&node);
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MachineGroupSpec;

    fn sample_specs() -> Vec<OperationSpec> {
        vec![
            OperationSpec::new("p1", 1, "a1", 1, 15.0).with_successor(2),
            OperationSpec::new("p1", 2, "a3", 1, 10.0),
            OperationSpec::new("p2", 1, "a2", 1, 15.0).with_successor(3),
            OperationSpec::new("p2", 2, "a1", 2, 5.0).with_successor(3),
            OperationSpec::new("p2", 3, "a3", 2, 10.0),
        ]
    }

    fn has_kind(errors: &[ValidationError], kind: ValidationErrorKind) -> bool {
        errors.iter().any(|e| e.kind == kind)
    }

    #[test]
    fn test_valid_input() {
        assert!(validate_operations(&sample_specs()).is_ok());
    }

    #[test]
    fn test_duplicate_key() {
        let mut specs = sample_specs();
        specs.push(OperationSpec::new("p1", 2, "a1", 1, 5.0));
        let errors = validate_operations(&specs).unwrap_err();
        assert!(has_kind(&errors, ValidationErrorKind::DuplicateId));
    }

    #[test]
    fn test_unknown_successor() {
        let specs = vec![
            OperationSpec::new("p1", 1, "a1", 1, 15.0).with_successor(9),
            OperationSpec::new("p1", 2, "a1", 1, 15.0),
        ];
        let errors = validate_operations(&specs).unwrap_err();
        assert!(has_kind(&errors, ValidationErrorKind::InvalidSuccessor));
    }

    #[test]
    fn test_successor_in_other_job_is_unknown() {
        let specs = vec![
            OperationSpec::new("p1", 1, "a1", 1, 15.0).with_successor(2),
            OperationSpec::new("p1", 3, "a1", 1, 15.0),
            OperationSpec::new("p2", 2, "a1", 1, 15.0),
        ];
        let errors = validate_operations(&specs).unwrap_err();
        assert!(has_kind(&errors, ValidationErrorKind::InvalidSuccessor));
    }

    #[test]
    fn test_successor_below_sentinel_is_unknown() {
        let mut spec = OperationSpec::new("p1", 1, "a1", 1, 15.0);
        spec.successor = -7;
        let errors = validate_operations(&[spec, OperationSpec::new("p1", 2, "a1", 1, 1.0)])
            .unwrap_err();
        assert!(has_kind(&errors, ValidationErrorKind::InvalidSuccessor));
    }

    #[test]
    fn test_missing_terminal() {
        // 1 → 2 → 1 has no terminal and is also a cycle
        let specs = vec![
            OperationSpec::new("p1", 1, "a1", 1, 15.0).with_successor(2),
            OperationSpec::new("p1", 2, "a1", 1, 15.0).with_successor(1),
        ];
        let errors = validate_operations(&specs).unwrap_err();
        assert!(has_kind(&errors, ValidationErrorKind::MissingTerminal));
        assert!(has_kind(&errors, ValidationErrorKind::CyclicDependency));
    }

    #[test]
    fn test_multiple_terminals() {
        let specs = vec![
            OperationSpec::new("p1", 1, "a1", 1, 15.0),
            OperationSpec::new("p1", 2, "a1", 1, 15.0),
        ];
        let errors = validate_operations(&specs).unwrap_err();
        assert!(has_kind(&errors, ValidationErrorKind::MultipleTerminals));
    }

    #[test]
    fn test_cycle_beside_terminal() {
        // 1 → 2 → 3 → 2, with 4 terminal
        let specs = vec![
            OperationSpec::new("p1", 1, "a1", 1, 1.0).with_successor(2),
            OperationSpec::new("p1", 2, "a1", 1, 1.0).with_successor(3),
            OperationSpec::new("p1", 3, "a1", 1, 1.0).with_successor(2),
            OperationSpec::new("p1", 4, "a1", 1, 1.0),
        ];
        let errors = validate_operations(&specs).unwrap_err();
        assert!(has_kind(&errors, ValidationErrorKind::CyclicDependency));
    }

    #[test]
    fn test_invalid_base_duration() {
        let specs = vec![OperationSpec::new("p1", 1, "a1", 1, f64::NAN)];
        let errors = validate_operations(&specs).unwrap_err();
        assert!(has_kind(&errors, ValidationErrorKind::InvalidBaseDuration));

        let specs = vec![OperationSpec::new("p1", 1, "a1", 1, -3.0)];
        let errors = validate_operations(&specs).unwrap_err();
        assert!(has_kind(&errors, ValidationErrorKind::InvalidBaseDuration));
    }

    #[test]
    fn test_unknown_machine_group() {
        let pool = MachinePool::from_specs(&[
            MachineGroupSpec::new("a1", 1, vec![1, 2]),
            MachineGroupSpec::new("a2", 1, vec![1, 2]),
        ])
        .unwrap();
        let errors = validate_machine_groups(&sample_specs(), &pool).unwrap_err();
        // p1_2 and p2_3 need a3
        assert_eq!(errors.len(), 2);
        assert!(has_kind(&errors, ValidationErrorKind::UnknownMachineGroup));
    }

    #[test]
    fn test_multiple_errors() {
        let specs = vec![
            OperationSpec::new("p1", 1, "a1", 1, -1.0).with_successor(5),
            OperationSpec::new("p1", 1, "a1", 1, 1.0),
        ];
        let errors = validate_operations(&specs).unwrap_err();
        assert!(errors.len() >= 3);
    }
}
