use crate::scheduler::{BlockAnalysis, DependencyAnalyzer, FunctionRegistry};

pub fn analyze(code: &str) -> BlockAnalysis {
    analyze_all(&[code]).remove(0)
}

/// Analyze each code string as the block with its position as index
pub fn analyze_all(blocks: &[&str]) -> Vec<BlockAnalysis> {
    let registry = FunctionRegistry::default();
    let analyzer = DependencyAnalyzer::new(&registry, "tR");
    blocks
        .iter()
        .enumerate()
        .map(|(i, code)| analyzer.analyze_code(i, code))
        .collect()
}

pub fn names(items: &[&str]) -> std::collections::BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}
