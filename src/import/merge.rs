//! Content-addressed merge.
//!
//! `merge(x, y)` folds `y` into `x`. Tags are matched by exact text and images
//! by name; matches take `x`'s IDs and everything unmatched from `y` gets a
//! fresh ID. The resulting content is the same either way round, but the IDs
//! are not: `merge(x, y)` and `merge(y, x)` keep different identities for
//! unmatched items. Callers that need stable IDs must keep the identity source
//! on the left.

use std::collections::BTreeMap;

use super::dataset::Dataset;
use crate::model::{Assignment, ImageId, TagId};

pub fn merge(x: &Dataset, y: &Dataset) -> Dataset {
    let mut merged = x.clone();

    let mut tag_ids: BTreeMap<String, TagId> = merged
        .tags
        .iter()
        .map(|(id, text)| (text.clone(), *id))
        .collect();
    let mut tag_map: BTreeMap<TagId, TagId> = BTreeMap::new();
    for (y_id, text) in &y.tags {
        let id = *tag_ids.entry(text.clone()).or_insert_with(|| {
            let id = TagId::new();
            merged.tags.insert(id, text.clone());
            id
        });
        tag_map.insert(*y_id, id);
    }

    let mut image_ids: BTreeMap<String, ImageId> = merged
        .images
        .iter()
        .map(|(id, image)| (image.name.clone(), *id))
        .collect();
    let mut image_map: BTreeMap<ImageId, ImageId> = BTreeMap::new();
    for (y_id, image) in &y.images {
        let id = *image_ids.entry(image.name.clone()).or_insert_with(|| {
            let id = ImageId::new();
            merged.images.insert(id, image.clone());
            id
        });
        image_map.insert(*y_id, id);
    }

    for a in &y.assignments {
        if let (Some(&image), Some(&tag)) = (image_map.get(&a.image), tag_map.get(&a.tag)) {
            merged.assignments.insert(Assignment { image, tag });
        }
    }

    merged
        .prefix_captions
        .extend(y.prefix_captions.iter().cloned());

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::dataset::DatasetImage;
    use std::collections::BTreeSet;
    use std::path::PathBuf;

    fn dataset(images: &[(&str, &[&str])], prefix: &[&str]) -> Dataset {
        let mut data = Dataset::default();
        for (name, tags) in images {
            let image = ImageId::new();
            data.images.insert(
                image,
                DatasetImage {
                    name: name.to_string(),
                    path: PathBuf::from(format!("/src/{name}.png")),
                },
            );
            for text in *tags {
                let tag = match data.tag_by_text(text) {
                    Some(id) => id,
                    None => {
                        let id = TagId::new();
                        data.tags.insert(id, text.to_string());
                        id
                    }
                };
                data.assignments.insert(Assignment { image, tag });
            }
        }
        data.prefix_captions = prefix.iter().map(|s| s.to_string()).collect();
        data
    }

    #[test]
    fn test_merge_with_empty_is_identity() {
        let x = dataset(&[("a", &["cat", "dog"]), ("b", &["dog"])], &["photo"]);
        assert_eq!(merge(&x, &Dataset::default()), x);
        assert_eq!(merge(&Dataset::default(), &x).content(), x.content());
    }

    #[test]
    fn test_union_without_duplicates() {
        let x = dataset(&[("a", &["cat"]), ("b", &["dog"])], &["photo"]);
        let y = dataset(&[("b", &["cat"]), ("c", &["bird"])], &["photo", "outdoor"]);

        let merged = merge(&x, &y);
        let content = merged.content();
        assert_eq!(merged.images.len(), 3);
        assert_eq!(
            content.tags,
            ["bird", "cat", "dog"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
        );
        assert_eq!(
            content.images["b"],
            ["cat", "dog"].iter().map(|s| s.to_string()).collect::<BTreeSet<_>>()
        );
        assert_eq!(content.prefix_captions.len(), 2);
    }

    #[test]
    fn test_ids_favor_left_side() {
        let x = dataset(&[("a", &["cat"])], &[]);
        let y = dataset(&[("a", &["cat"]), ("b", &["dog"])], &[]);

        let xy = merge(&x, &y);
        let yx = merge(&y, &x);
        assert_eq!(xy.content(), yx.content());

        assert_eq!(xy.tag_by_text("cat"), x.tag_by_text("cat"));
        assert_eq!(yx.tag_by_text("cat"), y.tag_by_text("cat"));
        assert_ne!(xy.image_by_name("b"), y.image_by_name("b"));
        assert_eq!(yx.image_by_name("b"), y.image_by_name("b"));
    }
}
