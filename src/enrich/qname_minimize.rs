//! Qname minimizer. Trims labels below a configured rightmost-label
//! depth, replacing removed labels with `-`.

/// Keep the rightmost `depth` labels of `qname`, replacing the rest with a
/// single `-` label. Idempotent: minimizing an already-minimized name is
/// a no-op.
pub fn minimize_qname(qname: &str, depth: usize) -> String {
    if qname.is_empty() || depth == 0 {
        return qname.to_string();
    }
    let labels: Vec<&str> = qname.split('.').collect();
    if labels.len() <= depth {
        return qname.to_string();
    }
    if labels.first() == Some(&"-") {
        return qname.to_string();
    }
    let kept = &labels[labels.len() - depth..];
    format!("-.{}", kept.join("."))
}
