/// Picks up to `count` distinct keywords from `pool` without replacement.
///
/// A `specific_topic` always comes first and counts toward `count`.
pub fn sample_keywords(
    pool: &[String],
    count: usize,
    specific_topic: Option<&str>,
    rng: &mut fastrand::Rng,
) -> Vec<String> {
    let mut picked = Vec::with_capacity(count);
    if let Some(topic) = specific_topic.map(str::trim).filter(|t| !t.is_empty()) {
        picked.push(topic.to_string());
    }

    let mut candidates: Vec<&String> = pool
        .iter()
        .filter(|k| !picked.iter().any(|p| p == *k))
        .collect();
    let wanted = count.saturating_sub(picked.len()).min(candidates.len());

    // Partial Fisher-Yates: only the first `wanted` slots are shuffled
    for i in 0..wanted {
        let j = rng.usize(i..candidates.len());
        candidates.swap(i, j);
    }
    picked.extend(candidates.into_iter().take(wanted).cloned());
    picked
}
