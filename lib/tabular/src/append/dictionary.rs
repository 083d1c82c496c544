//! Dictionary unification for the appender.

use std::{collections::HashMap, sync::Arc};

use columnar::dictionary::Dictionary;

use crate::Result;

/// A dictionary covering all input dictionaries, with the translations to
/// get there.
pub(crate) struct MergedDictionary {
    pub(crate) dictionary: Arc<Dictionary>,
    /// Per-input translations into [`dictionary`](Self::dictionary), or
    /// `None` when every input already uses it.
    pub(crate) remaps: Option<Vec<Arc<[i32]>>>,
}

/// Merges the dictionaries of the appended columns.
///
/// Equal dictionaries are reused as-is. Otherwise the merged dictionary
/// accumulates the distinct values of all inputs in the order they are
/// first encountered, and the result is boolean exactly if all inputs are
/// boolean, at most two values remain, and the declared positive values do
/// not conflict. Inputs without a declared positive defer to those with
/// one; a declared positive is honored even if no data row carries it.
pub(crate) fn merge(dictionaries: &[&Arc<Dictionary>]) -> Result<MergedDictionary> {
    assert!(!dictionaries.is_empty(), "no dictionaries to merge");
    let first = dictionaries[0];
    if dictionaries
        .iter()
        .all(|&dict| Arc::ptr_eq(dict, first) || **dict == **first)
    {
        return Ok(MergedDictionary {
            dictionary: first.clone(),
            remaps: None,
        });
    }

    let mut values: Vec<Arc<str>> = Vec::new();
    let mut lookup: HashMap<&str, u32> = HashMap::new();
    let mut remaps = Vec::with_capacity(dictionaries.len());
    for dict in dictionaries {
        let mut remap = Vec::with_capacity(dict.len());
        remap.push(0);
        for index in 1..dict.len() as u32 {
            let Some(value) = dict.get(index) else {
                remap.push(-1);
                continue;
            };
            let merged_index = *lookup.entry(value).or_insert_with(|| {
                values.push(Arc::from(value));
                values.len() as u32
            });
            remap.push(merged_index as i32);
        }
        remaps.push(remap.into());
    }

    let all_boolean = dictionaries.iter().all(|dict| dict.is_boolean());
    let declared = dictionaries
        .iter()
        .filter_map(|dict| dict.positive_value())
        .collect::<Vec<_>>();
    let conflict = declared.iter().any(|&label| label != declared[0]);
    let boolean =
        all_boolean && values.len() <= 2 && !conflict && (!declared.is_empty() || values.len() <= 1);
    let dictionary = if boolean {
        let positive = declared.first().and_then(|&label| {
            values
                .iter()
                .position(|value| value.as_ref() == label)
                .map(|index| index as u32 + 1)
        });
        Dictionary::boolean(values, positive)?
    } else {
        Dictionary::new(values)
    };
    Ok(MergedDictionary {
        dictionary: Arc::new(dictionary),
        remaps: Some(remaps),
    })
}
