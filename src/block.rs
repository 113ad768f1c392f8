use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::slot::Slot;

/// Keep only slots that open a run of at least `min_hours` back-to-back
/// slots on the same court and date.
///
/// A slot continues a run only when it starts exactly where the previous one
/// ended. Each qualifying run contributes its first slot, which is the start
/// time a player would book. `min_hours <= 1` returns the input unchanged.
pub fn filter_by_min_block(slots: Vec<Slot>, min_hours: u32) -> Vec<Slot> {
    if min_hours <= 1 {
        return slots;
    }
    let min_len = min_hours as usize;

    let mut groups: BTreeMap<(String, NaiveDate), Vec<Slot>> = BTreeMap::new();
    for slot in slots {
        groups
            .entry((slot.resource_id().to_string(), slot.date()))
            .or_default()
            .push(slot);
    }

    let mut result = Vec::new();
    for mut group in groups.into_values() {
        group.sort_by_key(Slot::start);
        // Repeated cells for the same start would otherwise break the run.
        group.dedup_by(|a, b| a.start() == b.start());

        let mut run_start = 0;
        for i in 1..=group.len() {
            let continues = i < group.len() && group[i].start() == group[i - 1].end();
            if continues {
                continue;
            }
            if i - run_start >= min_len {
                result.push(group[run_start].clone());
            }
            run_start = i;
        }
    }

    result
}
