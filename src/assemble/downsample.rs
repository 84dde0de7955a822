//! Random downsampling of property and value lists.

use rand::Rng;

use crate::model::PropertyEntry;

/// Remove uniformly random elements until at most `max` remain. A cap of
/// zero disables downsampling. Survivors keep their relative order.
pub fn downsample<T, R: Rng + ?Sized>(items: &mut Vec<T>, max: usize, rng: &mut R) {
    if max == 0 {
        return;
    }
    while items.len() > max {
        let idx = rng.gen_range(0..items.len());
        items.remove(idx);
    }
}

/// Cap the property list, then every surviving value list.
pub fn downsample_properties<R: Rng + ?Sized>(
    properties: &mut Vec<PropertyEntry>,
    proplist_max_len: usize,
    valuelist_max_len: usize,
    rng: &mut R,
) {
    downsample(properties, proplist_max_len, rng);
    for property in properties.iter_mut() {
        downsample(&mut property.values, valuelist_max_len, rng);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{TypedValue, ValueEntry, ValueKind};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn property(rel: &str, n: usize) -> PropertyEntry {
        PropertyEntry {
            relationship: rel.into(),
            property: rel.into(),
            kind: ValueKind::String,
            values: (0..n)
                .map(|i| ValueEntry::new(TypedValue::String { text: i.to_string(), url: None }))
                .collect(),
        }
    }

    #[test]
    fn test_zero_disables() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut v: Vec<u32> = (0..100).collect();
        downsample(&mut v, 0, &mut rng);
        assert_eq!(v.len(), 100);
    }

    #[test]
    fn test_caps_and_preserves_order() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut v: Vec<u32> = (0..100).collect();
        downsample(&mut v, 10, &mut rng);
        assert_eq!(v.len(), 10);
        assert!(v.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_short_list_untouched() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut v = vec!["a", "b"];
        downsample(&mut v, 5, &mut rng);
        assert_eq!(v, vec!["a", "b"]);
    }

    #[test]
    fn test_properties_then_values() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut props: Vec<PropertyEntry> =
            (0..6).map(|i| property(&format!("P{i}"), 30)).collect();
        downsample_properties(&mut props, 4, 20, &mut rng);
        assert_eq!(props.len(), 4);
        assert!(props.iter().all(|p| p.values.len() == 20));
    }
}
