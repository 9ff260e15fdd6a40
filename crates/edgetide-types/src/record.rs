//! The record model: one unit of data flowing through a pipeline.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::FieldError;
use crate::field::Field;
use crate::path::{self, PathSegment};

/// Mutable record metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Instance name of the stage that created the record.
    pub stage_creator: String,
    /// Origin-assigned source identifier, unique within a run.
    pub source_id: String,
    /// Instance name of the stage that redirected the record to the
    /// error destination, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_timestamp: Option<DateTime<Utc>>,
    /// Free-form string attributes.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

/// One unit of data flowing through the pipeline.
///
/// Owns exactly one root [`Field`] (usually a map) and a [`Header`].
/// Travels by value through one batch; processors mutate it in place.
/// `Clone` produces a fully independent deep copy, so fan-out to
/// multiple lanes cannot leak one branch's mutations into a sibling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    header: Header,
    root: Option<Field>,
    #[serde(skip)]
    read_only: bool,
}

impl Record {
    /// Create a record with the given creator stage, source id, and root field.
    pub fn new(
        stage_creator: impl Into<String>,
        source_id: impl Into<String>,
        root: Field,
    ) -> Self {
        Self {
            header: Header {
                stage_creator: stage_creator.into(),
                source_id: source_id.into(),
                ..Header::default()
            },
            root: Some(root),
            read_only: false,
        }
    }

    #[must_use]
    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut Header {
        &mut self.header
    }

    /// The root field, if the record has one.
    #[must_use]
    pub fn root(&self) -> Option<&Field> {
        self.root.as_ref()
    }

    /// A deep copy of this record that rejects mutation.
    ///
    /// Used for evaluation snapshots that must not be written through.
    #[must_use]
    pub fn read_only_copy(&self) -> Self {
        let mut copy = self.clone();
        copy.read_only = true;
        copy
    }

    /// Mark the record as redirected to the error destination.
    pub fn set_error(&mut self, stage: impl Into<String>, message: impl Into<String>) {
        self.header.error_stage = Some(stage.into());
        self.header.error_message = Some(message.into());
        self.header.error_timestamp = Some(Utc::now());
    }

    /// Resolve a field path.
    ///
    /// Three-way outcome, load-bearing for `record:valueOrDefault`:
    /// `Err` only when the path is malformed, traverses a non-container,
    /// or an intermediate container is absent; `Ok(None)` when the parent
    /// container exists but the leaf does not; `Ok(Some)` when present.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::InvalidPath`] as described above.
    pub fn get(&self, path: &str) -> Result<Option<&Field>, FieldError> {
        let segments = path::parse(path)?;
        if segments.is_empty() {
            return Ok(self.root.as_ref());
        }
        let mut current = match &self.root {
            Some(root) => root,
            None => return Err(FieldError::InvalidPath(path.to_string())),
        };
        let last = segments.len() - 1;
        for (i, segment) in segments.iter().enumerate() {
            let child = match (current, segment) {
                (Field::Map(entries), PathSegment::Key(key)) => entries.get(key),
                (Field::List(items), PathSegment::Index(index)) => items.get(*index),
                // Key into a list, index into a map, or any lookup under a
                // non-container field: the path itself is invalid.
                _ => return Err(FieldError::InvalidPath(path.to_string())),
            };
            match child {
                Some(field) => current = field,
                None if i == last => return Ok(None),
                None => return Err(FieldError::InvalidPath(path.to_string())),
            }
        }
        Ok(Some(current))
    }

    /// Set the field at `path`, returning the replaced field if any.
    ///
    /// Missing intermediate map entries are created on the way down; list
    /// traversal requires the indexed element to exist, except that the
    /// final segment may append at `[len]`. The empty path replaces the
    /// record root.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Unsupported`] on a read-only view and
    /// [`FieldError::InvalidPath`] when the path cannot be written.
    pub fn set_field(&mut self, path: &str, field: Field) -> Result<Option<Field>, FieldError> {
        if self.read_only {
            return Err(FieldError::Unsupported);
        }
        let segments = path::parse(path)?;
        let Some((leaf, intermediates)) = segments.split_last() else {
            return Ok(self.root.replace(field));
        };
        let mut current = self
            .root
            .get_or_insert_with(|| Field::Map(Default::default()));

        for segment in intermediates {
            current = match (current, segment) {
                (Field::Map(entries), PathSegment::Key(key)) => entries
                    .entry(key.clone())
                    .or_insert_with(|| Field::Map(Default::default())),
                (Field::List(items), PathSegment::Index(index)) => items
                    .get_mut(*index)
                    .ok_or_else(|| FieldError::InvalidPath(path.to_string()))?,
                _ => return Err(FieldError::InvalidPath(path.to_string())),
            };
        }
        match (current, leaf) {
            (Field::Map(entries), PathSegment::Key(key)) => Ok(entries.insert(key.clone(), field)),
            (Field::List(items), PathSegment::Index(index)) => {
                if *index < items.len() {
                    Ok(Some(std::mem::replace(&mut items[*index], field)))
                } else if *index == items.len() {
                    items.push(field);
                    Ok(None)
                } else {
                    Err(FieldError::InvalidPath(path.to_string()))
                }
            }
            _ => Err(FieldError::InvalidPath(path.to_string())),
        }
    }

    /// Delete the field at `path`, returning it if it was present.
    ///
    /// Deleting an absent leaf is a no-op; an absent intermediate
    /// container is still a path error.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::Unsupported`] on a read-only view and
    /// [`FieldError::InvalidPath`] when the path cannot be resolved.
    pub fn delete(&mut self, path: &str) -> Result<Option<Field>, FieldError> {
        if self.read_only {
            return Err(FieldError::Unsupported);
        }
        let segments = path::parse(path)?;
        let Some((leaf, intermediates)) = segments.split_last() else {
            return Ok(self.root.take());
        };
        let mut current = match self.root.as_mut() {
            Some(root) => root,
            None => return Err(FieldError::InvalidPath(path.to_string())),
        };

        for segment in intermediates {
            let child = match (current, segment) {
                (Field::Map(entries), PathSegment::Key(key)) => entries.get_mut(key),
                (Field::List(items), PathSegment::Index(index)) => items.get_mut(*index),
                _ => return Err(FieldError::InvalidPath(path.to_string())),
            };
            current = child.ok_or_else(|| FieldError::InvalidPath(path.to_string()))?;
        }
        match (current, leaf) {
            (Field::Map(entries), PathSegment::Key(key)) => Ok(entries.remove(key)),
            (Field::List(items), PathSegment::Index(index)) => {
                if *index < items.len() {
                    Ok(Some(items.remove(*index)))
                } else {
                    Ok(None)
                }
            }
            _ => Err(FieldError::InvalidPath(path.to_string())),
        }
    }

    /// Enumerate every populated path in the record, containers included,
    /// in deterministic order.
    #[must_use]
    pub fn field_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        if let Some(root) = &self.root {
            collect_paths(root, String::new(), &mut paths);
        }
        paths
    }
}

fn collect_paths(field: &Field, prefix: String, out: &mut Vec<String>) {
    match field {
        Field::Map(entries) => {
            for (key, child) in entries {
                let path = format!("{prefix}/{key}");
                out.push(path.clone());
                collect_paths(child, path, out);
            }
        }
        Field::List(items) => {
            for (index, child) in items.iter().enumerate() {
                let path = format!("{prefix}[{index}]");
                out.push(path.clone());
                collect_paths(child, path, out);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> Record {
        Record::new(
            "origin-1",
            "rawData::0",
            Field::map([
                (
                    "a",
                    Field::map([("b", Field::string("Test Value"))]),
                ),
                (
                    "items",
                    Field::List(vec![Field::Integer(10), Field::Integer(20)]),
                ),
            ]),
        )
    }

    #[test]
    fn get_present_path() {
        let record = sample_record();
        let field = record.get("/a/b").unwrap().unwrap();
        assert_eq!(field, &Field::string("Test Value"));
        assert_eq!(record.get("/items[1]").unwrap().unwrap(), &Field::Integer(20));
    }

    #[test]
    fn get_missing_leaf_under_present_container_is_none_not_error() {
        let record = sample_record();
        assert_eq!(record.get("/a/missing").unwrap(), None);
        assert_eq!(record.get("/items[5]").unwrap(), None);
    }

    #[test]
    fn get_missing_intermediate_container_is_an_error() {
        let record = sample_record();
        let err = record.get("/nope/leaf").unwrap_err();
        assert_eq!(err, FieldError::InvalidPath("/nope/leaf".to_string()));
    }

    #[test]
    fn get_through_scalar_is_an_error() {
        let record = sample_record();
        assert!(record.get("/a/b/c").is_err());
    }

    #[test]
    fn get_root() {
        let record = sample_record();
        assert_eq!(record.get("").unwrap(), record.root());
        assert_eq!(record.get("/").unwrap(), record.root());
    }

    #[test]
    fn set_field_replaces_and_returns_previous() {
        let mut record = sample_record();
        let previous = record
            .set_field("/a/b", Field::Integer(42))
            .unwrap()
            .unwrap();
        assert_eq!(previous, Field::string("Test Value"));
        assert_eq!(record.get("/a/b").unwrap().unwrap(), &Field::Integer(42));
    }

    #[test]
    fn set_field_creates_intermediate_maps() {
        let mut record = sample_record();
        record
            .set_field("/x/y/z", Field::Boolean(true))
            .unwrap();
        assert_eq!(record.get("/x/y/z").unwrap().unwrap(), &Field::Boolean(true));
    }

    #[test]
    fn set_field_appends_at_list_end_only() {
        let mut record = sample_record();
        assert!(record.set_field("/items[2]", Field::Integer(30)).unwrap().is_none());
        assert!(record.set_field("/items[9]", Field::Integer(99)).is_err());
    }

    #[test]
    fn delete_removes_leaf() {
        let mut record = sample_record();
        let removed = record.delete("/a/b").unwrap().unwrap();
        assert_eq!(removed, Field::string("Test Value"));
        assert_eq!(record.get("/a/b").unwrap(), None);
        // absent leaf: no-op
        assert!(record.delete("/a/b").unwrap().is_none());
    }

    #[test]
    fn clone_is_fully_independent() {
        let original = sample_record();
        let mut copy = original.clone();
        copy.set_field("/a/b", Field::string("mutated")).unwrap();
        copy.header_mut().attributes.insert("k".into(), "v".into());
        assert_eq!(
            original.get("/a/b").unwrap().unwrap(),
            &Field::string("Test Value")
        );
        assert!(original.header().attributes.is_empty());
    }

    #[test]
    fn read_only_copy_rejects_mutation() {
        let record = sample_record();
        let mut view = record.read_only_copy();
        assert_eq!(
            view.set_field("/a/b", Field::Integer(1)),
            Err(FieldError::Unsupported)
        );
        assert_eq!(view.delete("/a/b"), Err(FieldError::Unsupported));
        // reads still work
        assert!(view.get("/a/b").unwrap().is_some());
        // and the backing record was never touched
        assert_eq!(
            record.get("/a/b").unwrap().unwrap(),
            &Field::string("Test Value")
        );
    }

    #[test]
    fn field_paths_enumerates_containers_and_leaves() {
        let record = sample_record();
        let paths = record.field_paths();
        for expected in ["/a", "/a/b", "/items", "/items[0]", "/items[1]"] {
            assert!(paths.contains(&expected.to_string()), "missing {expected}");
        }
    }

    #[test]
    fn set_error_populates_header() {
        let mut record = sample_record();
        record.set_error("dest-1", "write refused");
        assert_eq!(record.header().error_stage.as_deref(), Some("dest-1"));
        assert_eq!(record.header().error_message.as_deref(), Some("write refused"));
        assert!(record.header().error_timestamp.is_some());
    }
}
