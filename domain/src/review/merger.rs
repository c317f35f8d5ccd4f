//! Multi-pass result merging
//!
//! When an agent reviews the same target several times, each pass may
//! report overlapping findings. The merger groups results by agent and
//! folds the successful passes into one deduplicated report whose order is
//! derived from agent insertion order, pass order and first-seen finding
//! order, never from completion order.

use super::finding::{Finding, FindingKey, extract_findings, normalize};
use super::result::ReviewResult;
use std::collections::{BTreeSet, HashMap};

/// Marker emitted when no pass reported anything.
pub const NO_FINDINGS: &str = "No findings.";

/// Title used for passes whose content has no finding headers.
pub const FALLBACK_TITLE: &str = "Review result";

const SEPARATOR: &str = "\n\n---\n\n";

#[derive(Debug)]
struct AggregatedFinding {
    title: String,
    body: String,
    passes: BTreeSet<usize>,
}

/// Merge a flat result list into one result per agent.
///
/// Agents with a single result pass through untouched.
pub fn merge_by_agent(results: Vec<ReviewResult>) -> Vec<ReviewResult> {
    let mut order: Vec<String> = Vec::new();
    let mut by_agent: HashMap<String, Vec<ReviewResult>> = HashMap::new();
    for result in results {
        let name = result.agent().name.clone();
        by_agent
            .entry(name.clone())
            .or_insert_with(|| {
                order.push(name);
                Vec::new()
            })
            .push(result);
    }

    order
        .into_iter()
        .filter_map(|name| by_agent.remove(&name))
        .filter_map(|mut agent_results| {
            if agent_results.len() == 1 {
                agent_results.pop()
            } else {
                merge_agent_results(agent_results)
            }
        })
        .collect()
}

fn merge_agent_results(mut results: Vec<ReviewResult>) -> Option<ReviewResult> {
    let total = results.len();
    let first = results.first()?;
    let agent = first.agent().clone();
    let target = first.target().to_string();

    let successful: Vec<&ReviewResult> = results.iter().filter(|r| r.is_success()).collect();
    if successful.is_empty() {
        return results.pop();
    }

    let mut keys: Vec<FindingKey> = Vec::new();
    let mut aggregated: HashMap<FindingKey, AggregatedFinding> = HashMap::new();

    for (index, result) in successful.iter().enumerate() {
        let pass = index + 1;
        let Some(content) = result.content() else {
            continue;
        };

        let blocks = extract_findings(content);
        if blocks.is_empty() {
            let normalized = normalize(content);
            if !normalized.is_empty() {
                record(
                    &mut keys,
                    &mut aggregated,
                    FindingKey::Fallback(normalized),
                    Finding::new(FALLBACK_TITLE, content),
                    pass,
                );
            }
            continue;
        }

        for block in blocks {
            let key = block.key();
            record(&mut keys, &mut aggregated, key, block, pass);
        }
    }

    let mut content = String::new();
    if keys.is_empty() {
        content.push_str(NO_FINDINGS);
    } else {
        let rendered: Vec<String> = keys
            .iter()
            .filter_map(|key| aggregated.get(key))
            .enumerate()
            .map(|(i, finding)| render_finding(i + 1, finding))
            .collect();
        content.push_str(&rendered.join(SEPARATOR));
    }

    let failed = total - successful.len();
    if failed > 0 {
        content.push_str(SEPARATOR);
        content.push_str(&format!(
            "> **Note**: {} of {} passes failed. The findings above come from the successful passes only.\n",
            failed, total
        ));
    }

    match ReviewResult::success(agent.clone(), target.clone(), content) {
        Ok(merged) => Some(merged),
        // Unreachable in practice: the merged content always has a marker
        Err(e) => Some(ReviewResult::failure(agent, target, e.to_string())),
    }
}

fn record(
    keys: &mut Vec<FindingKey>,
    aggregated: &mut HashMap<FindingKey, AggregatedFinding>,
    key: FindingKey,
    finding: Finding,
    pass: usize,
) {
    match aggregated.get_mut(&key) {
        Some(existing) => {
            existing.passes.insert(pass);
        }
        None => {
            keys.push(key.clone());
            aggregated.insert(
                key,
                AggregatedFinding {
                    title: finding.title,
                    body: finding.body,
                    passes: BTreeSet::from([pass]),
                },
            );
        }
    }
}

fn render_finding(number: usize, finding: &AggregatedFinding) -> String {
    let mut out = format!("### {}. {}\n\n", number, finding.title);
    if finding.passes.len() > 1 {
        let passes: Vec<String> = finding.passes.iter().map(|p| p.to_string()).collect();
        out.push_str(&format!("> Detected in passes: {}\n\n", passes.join(", ")));
    }
    out.push_str(finding.body.trim());
    out
}
