//! Extension Orderer - 정렬 힌트 기반 안정 위상 정렬
//!
//! `insertBefore` / `insertAfter` 로 선언된 상대 순서를 만족시키면서,
//! 제약이 없는 쌍은 입력 순서를 그대로 유지한다.
//!
//! 힌트는 선언 순서(익스텐션 순서, before → after)대로 그래프에 추가되고,
//! 사이클을 만드는 힌트는 버려진 뒤 `BrokenEdge` 로 보고된다.

use super::types::Extension;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;

/// 사이클 때문에 무시된 정렬 힌트 (`before` 가 `after` 앞에 와야 한다는 제약)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BrokenEdge {
    pub before: String,
    pub after: String,
    /// 힌트를 선언한 익스텐션 uid
    pub declared_by: String,
    pub plugin_id: String,
}

/// 정렬 결과
#[derive(Debug, Clone, Default)]
pub struct OrderOutcome {
    pub extensions: Vec<Arc<Extension>>,
    pub broken_edges: Vec<BrokenEdge>,
}

/// 익스텐션 정렬
///
/// 중복 uid 는 첫 번째 것만 남기고, 존재하지 않는 uid 를 가리키는 힌트는 무시한다.
pub fn order_extensions(input: Vec<Arc<Extension>>) -> OrderOutcome {
    let mut seen = HashSet::new();
    let extensions: Vec<Arc<Extension>> = input
        .into_iter()
        .filter(|e| seen.insert(e.uid.clone()))
        .collect();

    let index: HashMap<&str, usize> = extensions
        .iter()
        .enumerate()
        .map(|(i, e)| (e.uid.as_str(), i))
        .collect();

    let n = extensions.len();
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut in_degree = vec![0usize; n];
    let mut broken_edges = Vec::new();

    for (i, ext) in extensions.iter().enumerate() {
        let hints = ext
            .insert_before
            .iter()
            .map(|target| (true, target))
            .chain(ext.insert_after.iter().map(|target| (false, target)));

        for (is_before, target) in hints {
            let Some(&j) = index.get(target.as_str()) else {
                continue;
            };
            if i == j {
                continue;
            }
            let (from, to) = if is_before { (i, j) } else { (j, i) };

            if successors[from].contains(&to) {
                continue;
            }
            if reachable(&successors, to, from) {
                broken_edges.push(BrokenEdge {
                    before: extensions[from].uid.clone(),
                    after: extensions[to].uid.clone(),
                    declared_by: ext.uid.clone(),
                    plugin_id: ext.plugin_id.clone(),
                });
                continue;
            }

            successors[from].push(to);
            in_degree[to] += 1;
        }
    }

    // Kahn: 준비된 노드 중 입력 순서가 가장 빠른 것을 먼저
    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| in_degree[i] == 0)
        .map(Reverse)
        .collect();
    let mut ordered = Vec::with_capacity(n);

    while let Some(Reverse(i)) = ready.pop() {
        ordered.push(extensions[i].clone());
        for &next in &successors[i] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    OrderOutcome {
        extensions: ordered,
        broken_edges,
    }
}

/// start 에서 target 으로 가는 경로가 있는지
fn reachable(successors: &[Vec<usize>], start: usize, target: usize) -> bool {
    let mut stack = vec![start];
    let mut visited = vec![false; successors.len()];

    while let Some(node) = stack.pop() {
        if node == target {
            return true;
        }
        if std::mem::replace(&mut visited[node], true) {
            continue;
        }
        stack.extend(successors[node].iter().copied());
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ext(uid: &str, before: &[&str], after: &[&str]) -> Arc<Extension> {
        Arc::new(Extension {
            uid: uid.to_string(),
            kind: "console.navigation/href".into(),
            plugin_id: uid.split('[').next().unwrap_or(uid).to_string(),
            properties: json!({}),
            flags: None,
            insert_before: before.iter().map(|s| s.to_string()).collect(),
            insert_after: after.iter().map(|s| s.to_string()).collect(),
        })
    }

    fn uids(outcome: &OrderOutcome) -> Vec<&str> {
        outcome.extensions.iter().map(|e| e.uid.as_str()).collect()
    }

    #[test]
    fn test_no_hints_keeps_input_order() {
        let outcome = order_extensions(vec![ext("a[0]", &[], &[]), ext("b[0]", &[], &[]), ext("c[0]", &[], &[])]);
        assert_eq!(uids(&outcome), vec!["a[0]", "b[0]", "c[0]"]);
        assert!(outcome.broken_edges.is_empty());
    }

    #[test]
    fn test_before_and_after() {
        // B 는 A 뒤, C 는 A 앞
        let outcome = order_extensions(vec![
            ext("p[0]", &[], &[]),
            ext("p[1]", &[], &["p[0]"]),
            ext("p[2]", &["p[0]"], &[]),
        ]);
        assert_eq!(uids(&outcome), vec!["p[2]", "p[0]", "p[1]"]);
    }

    #[test]
    fn test_unconstrained_keep_relative_order() {
        let outcome = order_extensions(vec![
            ext("x[0]", &[], &[]),
            ext("x[1]", &[], &[]),
            ext("x[2]", &["x[0]"], &[]),
            ext("x[3]", &[], &[]),
        ]);
        // x[0] 은 x[2] 가 나올 때까지 대기, 나머지는 입력 순서
        assert_eq!(uids(&outcome), vec!["x[1]", "x[2]", "x[0]", "x[3]"]);
    }

    #[test]
    fn test_cycle_is_broken_and_reported() {
        // a → b (a before b), b → a (b before a) : 두 번째 힌트가 버려진다
        let outcome = order_extensions(vec![
            ext("a[0]", &["b[0]"], &[]),
            ext("b[0]", &["a[0]"], &[]),
        ]);

        assert_eq!(uids(&outcome), vec!["a[0]", "b[0]"]);
        assert_eq!(outcome.broken_edges.len(), 1);
        let broken = &outcome.broken_edges[0];
        assert_eq!(broken.before, "b[0]");
        assert_eq!(broken.after, "a[0]");
        assert_eq!(broken.declared_by, "b[0]");
        assert_eq!(broken.plugin_id, "b");
    }

    #[test]
    fn test_longer_cycle_keeps_every_extension() {
        let outcome = order_extensions(vec![
            ext("a[0]", &[], &["c[0]"]),
            ext("b[0]", &[], &["a[0]"]),
            ext("c[0]", &[], &["b[0]"]),
        ]);

        assert_eq!(outcome.extensions.len(), 3);
        assert_eq!(outcome.broken_edges.len(), 1);
        // c → a, a → b 유지 / b → c 제거
        assert_eq!(uids(&outcome), vec!["c[0]", "a[0]", "b[0]"]);
    }

    #[test]
    fn test_unknown_targets_and_duplicates_ignored() {
        let outcome = order_extensions(vec![
            ext("a[0]", &["missing[9]"], &[]),
            ext("b[0]", &[], &[]),
            ext("a[0]", &[], &[]),
        ]);
        assert_eq!(uids(&outcome), vec!["a[0]", "b[0]"]);
        assert!(outcome.broken_edges.is_empty());
    }
}
