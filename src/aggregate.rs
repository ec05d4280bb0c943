//! Grouping validated subjects into per-class collections.

use crate::maturity::MaturityReport;
use crate::model::{ClassCollection, ClassCompliance, ValidatedSubject};
use crate::shapes::ShapeSet;
use crate::vocab::short_name;
use indexmap::{IndexMap, IndexSet};

/// One collection per target class declared in the shapes, zero-count ones
/// included, followed by classes only seen on unshaped subjects.
///
/// Declared classes come first in declaration order; sort by `class_name`
/// when another order is needed.
pub fn aggregate(
    subjects: Vec<ValidatedSubject>,
    shapes: &ShapeSet,
    report: &MaturityReport,
) -> Vec<ClassCollection> {
    let mut groups: IndexMap<String, Vec<ValidatedSubject>> = shapes
        .target_classes()
        .into_iter()
        .map(|class| (class.to_string(), Vec::new()))
        .collect();
    for subject in subjects {
        groups.entry(subject.class.clone()).or_default().push(subject);
    }

    groups
        .into_iter()
        .map(|(class_uri, objects)| ClassCollection {
            class_name: short_name(&class_uri),
            count: objects.len(),
            compliance: compliance_for(&class_uri, report),
            class_uri,
            objects,
        })
        .collect()
}

fn compliance_for(class: &str, report: &MaturityReport) -> Option<ClassCompliance> {
    let missing_at_tier = report
        .per_tier
        .iter()
        .find(|tier| tier.missing_classes.iter().any(|missing| missing == class))
        .map(|tier| tier.tier);
    let missing_optional_properties: IndexSet<String> = report
        .per_tier
        .iter()
        .flat_map(|tier| &tier.missing_optional_properties)
        .filter(|missing| missing.target_class == class)
        .map(|missing| missing.path.clone())
        .collect();

    if missing_at_tier.is_none() && missing_optional_properties.is_empty() {
        return None;
    }
    Some(ClassCompliance {
        missing_at_tier,
        missing_optional_properties: missing_optional_properties.into_iter().collect(),
    })
}
