use crate::config::DetectionPolicy;
use crate::detect::SheetRoles;
use crate::grid::Grid;
use crate::idlist::extract_id;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRow {
    pub row: u32,
    pub id: String,
    pub name: String,
}

/// Per-sheet map from normalized identifier to the data rows carrying it.
#[derive(Debug, Clone, Default)]
pub struct StudentIndex {
    pub sheet: String,
    pub by_id: HashMap<String, Vec<RosterRow>>,
    pub rows: Vec<RosterRow>,
}

impl StudentIndex {
    pub fn candidates(&self, id: &str) -> &[RosterRow] {
        self.by_id.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Indexes every data row of a sheet using the detector's id and name columns.
///
/// With a target set only member ids are indexed; rows without an id add nothing.
pub fn build_student_index<G: Grid + ?Sized>(
    grid: &G,
    roles: &SheetRoles,
    targets: Option<&BTreeSet<String>>,
    policy: &DetectionPolicy,
) -> StudentIndex {
    let mut index = StudentIndex {
        sheet: roles.sheet.clone(),
        ..StudentIndex::default()
    };
    for row in roles.first_data_row..=roles.max_row {
        let value = grid.cell_value(&roles.sheet, row, roles.id_column);
        let Some(id) = extract_id(&value, targets, policy.min_id_digits) else {
            continue;
        };
        let entry = RosterRow {
            row,
            id: id.clone(),
            name: roles.name_columns.read_name(grid, &roles.sheet, row),
        };
        index.by_id.entry(id).or_default().push(entry.clone());
        index.rows.push(entry);
    }
    log::debug!(
        "sheet '{}': indexed {} row(s), {} distinct id(s)",
        index.sheet,
        index.rows.len(),
        index.by_id.len()
    );
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::detect_roles;
    use crate::grid::tests::workbook;
    use serde_json::json;

    #[test]
    fn duplicate_ids_collect_all_rows_in_order() {
        let wb = workbook(json!([{
            "name": "S",
            "rows": [
                ["Last", "First", "ID"],
                ["Lee", "Ann", 555555],
                ["Chan", "Bo", "666666.0"],
                ["Diaz", "Cy", null],
                ["Lee", "Ann", "555555@school.example"]
            ]
        }]));
        let policy = DetectionPolicy::default();
        let roles = detect_roles(&wb, "S", None, &policy).expect("roles");
        let index = build_student_index(&wb, &roles, None, &policy);

        assert_eq!(index.rows.len(), 3);
        let rows: Vec<u32> = index.candidates("555555").iter().map(|r| r.row).collect();
        assert_eq!(rows, vec![2, 5]);
        assert_eq!(index.candidates("666666")[0].name, "Chan Bo");
        assert!(index.candidates("777777").is_empty());
        assert_eq!(index.rows[1].id, "666666");
    }

    #[test]
    fn target_set_limits_index_to_members() {
        let wb = workbook(json!([{
            "name": "S",
            "rows": [["Name", "ID"], ["Ann", 111111], ["Bo", 222222]]
        }]));
        let policy = DetectionPolicy::default();
        let targets: BTreeSet<String> = ["222222".to_string()].into_iter().collect();
        let roles = detect_roles(&wb, "S", Some(&targets), &policy).expect("roles");
        let index = build_student_index(&wb, &roles, Some(&targets), &policy);
        assert_eq!(index.rows.len(), 1);
        assert_eq!(index.candidates("222222")[0].row, 3);
    }
}
