//! Editing documents by key.
//!
//! Some files keep the same block twice (the physics constants are stored in
//! two copies). Edits, checks and comparisons here address fields by the key
//! text they were found under, so one edit reaches every copy.

use std::collections::HashMap;

use jsb_common::ByteCursor;
use jsb_layout::{FieldDescriptor, LayoutTable};

use crate::decode::read_value;
use crate::encode::prepare;
use crate::{DecodedDocument, Error, FieldMap, Result, Value};

/// Key a field answers to: its anchor key, or its name.
fn field_key(field: &FieldDescriptor) -> &str {
    field.key().unwrap_or(field.name())
}

fn matching<'a>(layout: &'a LayoutTable, key: &'a str) -> impl Iterator<Item = &'a FieldDescriptor> {
    layout
        .fields()
        .iter()
        .filter(move |f| f.name() == key || f.key() == Some(key))
}

/// One field changed by a patch.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub field: String,
    pub old: Value,
    pub new: Value,
}

/// What a patch did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatchReport {
    pub updated: Vec<FieldUpdate>,
    /// Edit keys no field answers to.
    pub unknown: Vec<String>,
}

impl PatchReport {
    /// Updates that actually changed a value.
    pub fn changed(&self) -> impl Iterator<Item = &FieldUpdate> {
        self.updated.iter().filter(|u| !u.old.same_as(&u.new))
    }
}

/// Apply `edits` to a document.
///
/// Every field whose name or key equals an edit key is set, so a physics key
/// updates both copies. Unknown keys are reported and skipped. Values are
/// checked against every target field before anything is changed; stored
/// values are normalised to what the file will hold (`12.0` for an `i32`
/// field is stored as `12`).
pub fn apply_patch(doc: &mut DecodedDocument, layout: &LayoutTable, edits: &FieldMap) -> Result<PatchReport> {
    let mut report = PatchReport::default();
    let mut pending = Vec::new();

    for (key, value) in edits.iter() {
        let mut found = false;
        for field in matching(layout, key) {
            found = true;
            let old = doc
                .fields
                .get(field.name())
                .ok_or_else(|| Error::MissingField(field.name().to_string()))?;
            let bytes = prepare(field, value)?;
            let new = read_value(&mut ByteCursor::new(&bytes[..]), field.ty())?;
            pending.push(FieldUpdate {
                field: field.name().to_string(),
                old: old.clone(),
                new,
            });
        }

        if !found {
            tracing::warn!(key, "no field for patch key, skipped");
            report.unknown.push(key.to_string());
        }
    }

    for update in &pending {
        doc.fields.insert(update.field.as_str(), update.new.clone());
    }
    report.updated = pending;

    tracing::debug!(
        updated = report.updated.len(),
        unknown = report.unknown.len(),
        "applied patch"
    );
    Ok(report)
}

/// A key whose fields do not hold the desired value.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyFailure {
    pub key: String,
    pub expected: Value,
    /// Every field answering to the key, with its value.
    pub found: Vec<(String, Value)>,
}

/// Outcome of checking a document against desired values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VerifyReport {
    pub passed: Vec<String>,
    pub failed: Vec<VerifyFailure>,
    /// Keys that passed while some copy still holds another value.
    pub disagreements: Vec<String>,
    pub unknown: Vec<String>,
}

impl VerifyReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Check that a document holds the desired values.
///
/// Values are compared as they would be stored: a desired `0.1` matches an
/// `f32` field holding `0.1f32`. A key passes when at least one field
/// answering to it holds the value; copies that disagree are recorded as
/// warnings.
pub fn verify(doc: &DecodedDocument, layout: &LayoutTable, desired: &FieldMap) -> Result<VerifyReport> {
    let mut report = VerifyReport::default();

    for (key, expected) in desired.iter() {
        let mut found = Vec::new();
        let mut matches = 0;

        for field in matching(layout, key) {
            let current = doc
                .fields
                .get(field.name())
                .ok_or_else(|| Error::MissingField(field.name().to_string()))?;
            let want = prepare(field, expected).ok();
            if want.is_some() && want == prepare(field, current).ok() {
                matches += 1;
            }
            found.push((field.name().to_string(), current.clone()));
        }

        if found.is_empty() {
            tracing::warn!(key, "no field for key");
            report.unknown.push(key.to_string());
        } else if matches == 0 {
            report.failed.push(VerifyFailure {
                key: key.to_string(),
                expected: expected.clone(),
                found,
            });
        } else {
            if matches < found.len() {
                tracing::warn!(key, "copies disagree");
                report.disagreements.push(key.to_string());
            }
            report.passed.push(key.to_string());
        }
    }

    Ok(report)
}

/// Fields sharing a key whose values differ.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyDifference {
    pub key: String,
    pub values: Vec<(String, Value)>,
}

/// Find keys whose copies hold different values.
pub fn compare_copies(doc: &DecodedDocument, layout: &LayoutTable) -> Result<Vec<CopyDifference>> {
    let mut groups: Vec<(&str, Vec<&FieldDescriptor>)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for field in layout.fields() {
        let key = field_key(field);
        match index.get(key) {
            Some(&i) => groups[i].1.push(field),
            None => {
                index.insert(key, groups.len());
                groups.push((key, vec![field]));
            }
        }
    }

    let mut differences = Vec::new();
    for (key, fields) in groups.into_iter().filter(|(_, fields)| fields.len() > 1) {
        let values = fields
            .iter()
            .map(|f| {
                doc.fields
                    .get(f.name())
                    .map(|v| (f.name().to_string(), v.clone()))
                    .ok_or_else(|| Error::MissingField(f.name().to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        let first = &values[0].1;
        if values.iter().any(|(_, v)| !v.same_as(first)) {
            differences.push(CopyDifference {
                key: key.to_string(),
                values,
            });
        }
    }

    Ok(differences)
}
