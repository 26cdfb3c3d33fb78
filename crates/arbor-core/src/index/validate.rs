use super::{NodeMetadata, TreeIndex};
use crate::model::Document;

impl TreeIndex {
    /// Check the index against the document and describe what is wrong
    ///
    /// Reports cycles, shared references and access failures found by the
    /// last rebuild, orphans (entries whose parent cannot be resolved or whose
    /// node is gone) and broken parent/child/path links. Never fails; returns
    /// a one-line `OK` summary when there is nothing to report.
    pub fn validate(&self, doc: &Document) -> String {
        let mut issues = Vec::new();

        if !self.is_clean() {
            issues.push("STATE index is dirty; entries reflect the last rebuild".to_string());
        }

        for cycle in &self.diagnostics.cycles {
            issues.push(format!(
                "CYCLE {} at {} refers back to its ancestor at {}",
                cycle.node, cycle.path, cycle.ancestor_path
            ));
        }
        for shared in &self.diagnostics.shared {
            issues.push(format!(
                "SHARED {} at {} is already indexed at {}",
                shared.node, shared.other_path, shared.first_path
            ));
        }
        for report in &self.diagnostics.failures {
            issues.push(format!(
                "ACCESS {} member '{}' at {}: {}",
                report.failure.node, report.failure.member, report.path, report.failure.reason
            ));
        }

        let mut entries: Vec<&NodeMetadata> = self.entries.values().collect();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        for meta in entries {
            self.check_entry(doc, meta, &mut issues);
        }

        if issues.is_empty() {
            return format!("OK: {} nodes, {} roots", self.entries.len(), self.roots.len());
        }
        tracing::warn!(issue_count = issues.len(), "tree validation found issues");
        let mut report = format!("{} issue(s) found", issues.len());
        for issue in issues {
            report.push('\n');
            report.push_str(&issue);
        }
        report
    }

    fn check_entry(&self, doc: &Document, meta: &NodeMetadata, issues: &mut Vec<String>) {
        if !doc.is_alive(meta.node) {
            issues.push(format!("ORPHAN {} at {} is no longer alive", meta.node, meta.path));
            return;
        }
        match meta.parent {
            None if meta.path.depth() > 1 => issues.push(format!(
                "ORPHAN {} at {} has no resolvable parent",
                meta.node, meta.path
            )),
            Some(parent) => match self.entries.get(&parent) {
                None => issues.push(format!(
                    "ORPHAN {} at {} names unindexed parent {}",
                    meta.node, meta.path, parent
                )),
                Some(parent_meta) if !parent_meta.children.contains(&meta.node) => {
                    issues.push(format!(
                        "LINK {} at {} is missing from the children of {}",
                        meta.node, meta.path, parent
                    ))
                }
                Some(_) => {}
            },
            None => {}
        }
        for child in &meta.children {
            if self.parent(*child) != Some(meta.node) {
                issues.push(format!(
                    "LINK {} lists child {} whose parent differs",
                    meta.node, child
                ));
            }
        }
        if self.by_path.get(&meta.path) != Some(&meta.node) {
            issues.push(format!("LINK {} path {} maps to another node", meta.node, meta.path));
        }
        if doc.node_at(&meta.path) != Some(meta.node) {
            issues.push(format!(
                "LINK {} path {} no longer resolves to it in the document",
                meta.node, meta.path
            ));
        }
    }
}
