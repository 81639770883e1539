use crate::structs::Utxo;

/// What happens to a tweak's highest value after some of its outputs are spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighestValueUpdate {
    /// The previous maximum is still unspent.
    Unchanged,
    /// The previous maximum was spent, this is the largest remaining value.
    Set(u64),
    /// Nothing remains unspent.
    Delete,
}

/// Decides the new highest value from the values unspent before the spend
/// and the values spent by it. `spent` must be a sub-multiset of `before`.
pub fn highest_value_update(before: &[u64], spent: &[u64]) -> HighestValueUpdate {
    let Some(previous_max) = before.iter().copied().max() else {
        return HighestValueUpdate::Unchanged;
    };
    if !spent.contains(&previous_max) {
        return HighestValueUpdate::Unchanged;
    }

    let mut remaining = before.to_vec();
    for value in spent {
        if let Some(pos) = remaining.iter().position(|v| v == value) {
            remaining.swap_remove(pos);
        }
    }
    match remaining.into_iter().max() {
        Some(max) => HighestValueUpdate::Set(max),
        None => HighestValueUpdate::Delete,
    }
}

/// Result of marking outputs of one transaction as spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendEffect {
    /// Vouts that flipped from unspent to spent.
    pub newly_spent: Vec<u32>,
    /// Every row of the group is now spent.
    pub all_spent: bool,
    pub highest_value: HighestValueUpdate,
}

/// Marks the rows of `group` whose vout is in `vouts` as spent.
///
/// Returns `None` when no row changed, e.g. the vouts are unknown or were
/// already spent.
pub fn spend_outputs(group: &mut [Utxo], vouts: &[u32]) -> Option<SpendEffect> {
    let before: Vec<u64> = group
        .iter()
        .filter(|row| !row.spent)
        .map(|row| row.value)
        .collect();

    let mut newly_spent = Vec::new();
    let mut spent_values = Vec::new();
    for row in group.iter_mut() {
        if !row.spent && vouts.contains(&row.vout) {
            row.spent = true;
            newly_spent.push(row.vout);
            spent_values.push(row.value);
        }
    }
    if newly_spent.is_empty() {
        return None;
    }

    Some(SpendEffect {
        newly_spent,
        all_spent: group.iter().all(|row| row.spent),
        highest_value: highest_value_update(&before, &spent_values),
    })
}

#[cfg(test)]
mod tests {
    use bitcoin::hashes::Hash;
    use bitcoin::{BlockHash, ScriptBuf, Txid};

    use super::*;
    use crate::constants::PROBE_VALUE;

    fn group(values: &[u64]) -> Vec<Utxo> {
        values
            .iter()
            .enumerate()
            .map(|(vout, value)| Utxo {
                txid: Txid::from_byte_array([1; 32]),
                vout: vout as u32,
                value: *value,
                script_pubkey: ScriptBuf::new(),
                block_height: 1,
                block_hash: BlockHash::from_byte_array([2; 32]),
                timestamp: 0,
                spent: false,
            })
            .collect()
    }

    #[test]
    fn spending_a_smaller_output_keeps_the_maximum() {
        let mut rows = group(&[500, 900, 300]);
        let effect = spend_outputs(&mut rows, &[0]).unwrap();
        assert_eq!(effect.highest_value, HighestValueUpdate::Unchanged);
        assert!(!effect.all_spent);
    }

    #[test]
    fn spending_the_maximum_lowers_it() {
        let mut rows = group(&[500, 900, 300]);
        let effect = spend_outputs(&mut rows, &[1]).unwrap();
        assert_eq!(effect.highest_value, HighestValueUpdate::Set(500));
    }

    #[test]
    fn spending_everything_deletes() {
        let mut rows = group(&[500, 900]);
        spend_outputs(&mut rows, &[0]).unwrap();
        let effect = spend_outputs(&mut rows, &[1]).unwrap();
        assert_eq!(effect.highest_value, HighestValueUpdate::Delete);
        assert!(effect.all_spent);
    }

    #[test]
    fn equal_maximum_values_survive_a_single_spend() {
        let mut rows = group(&[700, 700]);
        let effect = spend_outputs(&mut rows, &[0]).unwrap();
        assert_eq!(effect.highest_value, HighestValueUpdate::Set(700));
    }

    #[test]
    fn unknown_or_repeated_spends_change_nothing() {
        let mut rows = group(&[500]);
        assert!(spend_outputs(&mut rows, &[7]).is_none());
        spend_outputs(&mut rows, &[0]).unwrap();
        assert!(spend_outputs(&mut rows, &[0]).is_none());
    }

    #[test]
    fn probe_forces_recomputation() {
        assert_eq!(
            highest_value_update(&[10, 40, PROBE_VALUE], &[PROBE_VALUE]),
            HighestValueUpdate::Set(40)
        );
        assert_eq!(
            highest_value_update(&[PROBE_VALUE], &[PROBE_VALUE]),
            HighestValueUpdate::Delete
        );
    }
}
