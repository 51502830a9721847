//! Read-only catalog repository with deterministic import/export.

use crate::types::{CatalogDump, ConductorType, InverterType, SwitchTypeRecord, TransformerType};
use crate::{CatalogError, CatalogResult};
use mvnet_core::canonical;
use mvnet_core::readiness::CatalogIndex;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Catalog category selector for the generic lookup surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CatalogCategory {
    LineTypes,
    CableTypes,
    TransformerTypes,
    SwitchTypes,
    InverterTypes,
}

/// How an incoming dump is combined with an existing repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// New ids are added; existing ids are left unmodified.
    Merge,
    /// The dump replaces the repository; blocked when a referenced type
    /// would disappear.
    Replace,
}

/// Outcome of an import, sorted id lists per bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    pub added: Vec<String>,
    pub skipped: Vec<String>,
    pub conflicts: Vec<String>,
}

/// Immutable type library. Shared freely after construction; import
/// produces a fresh repository (copy-on-write at the value level).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogRepository {
    line_types: BTreeMap<String, ConductorType>,
    cable_types: BTreeMap<String, ConductorType>,
    transformer_types: BTreeMap<String, TransformerType>,
    switch_types: BTreeMap<String, SwitchTypeRecord>,
    inverter_types: BTreeMap<String, InverterType>,
    manifest_fingerprint: String,
}

impl CatalogRepository {
    /// Build a repository from a dump, rejecting duplicate ids per
    /// category and fingerprinting the manifest.
    pub fn from_dump(dump: CatalogDump) -> CatalogResult<Self> {
        fn keyed<T: Clone>(
            items: &[T],
            id_of: impl Fn(&T) -> &str,
        ) -> CatalogResult<BTreeMap<String, T>> {
            let mut map = BTreeMap::new();
            for item in items {
                let id = id_of(item).to_string();
                if map.insert(id.clone(), item.clone()).is_some() {
                    return Err(CatalogError::DuplicateTypeId(id));
                }
            }
            Ok(map)
        }

        let mut repo = Self {
            line_types: keyed(&dump.line_types, |t| &t.id)?,
            cable_types: keyed(&dump.cable_types, |t| &t.id)?,
            transformer_types: keyed(&dump.transformer_types, |t| &t.id)?,
            switch_types: keyed(&dump.switch_types, |t| &t.id)?,
            inverter_types: keyed(&dump.inverter_types, |t| &t.id)?,
            manifest_fingerprint: String::new(),
        };
        repo.manifest_fingerprint = canonical::fingerprint(&repo.dump_value()?)?;
        Ok(repo)
    }

    /// SHA-256 of the canonical dump of the whole library.
    pub fn manifest_fingerprint(&self) -> &str {
        &self.manifest_fingerprint
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn get_line_type(&self, id: &str) -> Option<&ConductorType> {
        self.line_types.get(id)
    }

    pub fn get_cable_type(&self, id: &str) -> Option<&ConductorType> {
        self.cable_types.get(id)
    }

    pub fn get_transformer_type(&self, id: &str) -> Option<&TransformerType> {
        self.transformer_types.get(id)
    }

    pub fn get_switch_type(&self, id: &str) -> Option<&SwitchTypeRecord> {
        self.switch_types.get(id)
    }

    pub fn get_inverter_type(&self, id: &str) -> Option<&InverterType> {
        self.inverter_types.get(id)
    }

    /// Generic lookup returning the record as a JSON value.
    pub fn get(&self, category: CatalogCategory, id: &str) -> Option<Value> {
        let to_value = |r: Result<Value, serde_json::Error>| r.ok();
        match category {
            CatalogCategory::LineTypes => self
                .line_types
                .get(id)
                .and_then(|t| to_value(serde_json::to_value(t))),
            CatalogCategory::CableTypes => self
                .cable_types
                .get(id)
                .and_then(|t| to_value(serde_json::to_value(t))),
            CatalogCategory::TransformerTypes => self
                .transformer_types
                .get(id)
                .and_then(|t| to_value(serde_json::to_value(t))),
            CatalogCategory::SwitchTypes => self
                .switch_types
                .get(id)
                .and_then(|t| to_value(serde_json::to_value(t))),
            CatalogCategory::InverterTypes => self
                .inverter_types
                .get(id)
                .and_then(|t| to_value(serde_json::to_value(t))),
        }
    }

    /// `(name, id)` pairs of a category, sorted by `(name, id)`.
    pub fn list(&self, category: CatalogCategory) -> Vec<(String, String)> {
        let mut entries: Vec<(String, String)> = match category {
            CatalogCategory::LineTypes => self
                .line_types
                .values()
                .map(|t| (t.name.clone(), t.id.clone()))
                .collect(),
            CatalogCategory::CableTypes => self
                .cable_types
                .values()
                .map(|t| (t.name.clone(), t.id.clone()))
                .collect(),
            CatalogCategory::TransformerTypes => self
                .transformer_types
                .values()
                .map(|t| (t.name.clone(), t.id.clone()))
                .collect(),
            CatalogCategory::SwitchTypes => self
                .switch_types
                .values()
                .map(|t| (t.name.clone(), t.id.clone()))
                .collect(),
            CatalogCategory::InverterTypes => self
                .inverter_types
                .values()
                .map(|t| (t.name.clone(), t.id.clone()))
                .collect(),
        };
        entries.sort();
        entries
    }

    // =========================================================================
    // Export / import
    // =========================================================================

    /// Deterministic dump, each category sorted by `(name, id)`.
    pub fn export_dump(&self) -> CatalogDump {
        fn sorted<T: Clone>(
            map: &BTreeMap<String, T>,
            name_of: impl Fn(&T) -> &str,
            id_of: impl Fn(&T) -> &str,
        ) -> Vec<T> {
            let mut items: Vec<T> = map.values().cloned().collect();
            items.sort_by(|a, b| {
                (name_of(a).to_string(), id_of(a).to_string())
                    .cmp(&(name_of(b).to_string(), id_of(b).to_string()))
            });
            items
        }
        CatalogDump {
            line_types: sorted(&self.line_types, |t| &t.name, |t| &t.id),
            cable_types: sorted(&self.cable_types, |t| &t.name, |t| &t.id),
            transformer_types: sorted(&self.transformer_types, |t| &t.name, |t| &t.id),
            switch_types: sorted(&self.switch_types, |t| &t.name, |t| &t.id),
            inverter_types: sorted(&self.inverter_types, |t| &t.name, |t| &t.id),
        }
    }

    fn dump_value(&self) -> CatalogResult<Value> {
        serde_json::to_value(self.export_dump())
            .map_err(|e| mvnet_core::CodecError::Serialize(e.to_string()).into())
    }

    /// Import a dump, producing a new repository and a report.
    ///
    /// `referenced_type_ids` is the set of type ids currently bound by
    /// instances; replace-mode import refuses to drop any of them.
    pub fn import(
        &self,
        dump: CatalogDump,
        mode: ImportMode,
        referenced_type_ids: &BTreeSet<String>,
    ) -> CatalogResult<(Self, ImportReport)> {
        match mode {
            ImportMode::Merge => self.merge_import(dump),
            ImportMode::Replace => self.replace_import(dump, referenced_type_ids),
        }
    }

    fn merge_import(&self, dump: CatalogDump) -> CatalogResult<(Self, ImportReport)> {
        let mut merged = self.export_dump();
        let mut report = ImportReport::default();

        fn merge_bucket<T: Clone>(
            existing: &mut Vec<T>,
            incoming: Vec<T>,
            id_of: impl Fn(&T) -> &str,
            report: &mut ImportReport,
        ) {
            let known: BTreeSet<String> =
                existing.iter().map(|t| id_of(t).to_string()).collect();
            for item in incoming {
                let id = id_of(&item).to_string();
                if known.contains(&id) {
                    report.skipped.push(id);
                } else {
                    report.added.push(id);
                    existing.push(item);
                }
            }
        }

        merge_bucket(&mut merged.line_types, dump.line_types, |t| &t.id, &mut report);
        merge_bucket(&mut merged.cable_types, dump.cable_types, |t| &t.id, &mut report);
        merge_bucket(
            &mut merged.transformer_types,
            dump.transformer_types,
            |t| &t.id,
            &mut report,
        );
        merge_bucket(&mut merged.switch_types, dump.switch_types, |t| &t.id, &mut report);
        merge_bucket(
            &mut merged.inverter_types,
            dump.inverter_types,
            |t| &t.id,
            &mut report,
        );

        report.added.sort();
        report.skipped.sort();
        Ok((Self::from_dump(merged)?, report))
    }

    fn replace_import(
        &self,
        dump: CatalogDump,
        referenced_type_ids: &BTreeSet<String>,
    ) -> CatalogResult<(Self, ImportReport)> {
        let incoming_ids: BTreeSet<String> = dump
            .line_types
            .iter()
            .map(|t| t.id.clone())
            .chain(dump.cable_types.iter().map(|t| t.id.clone()))
            .chain(dump.transformer_types.iter().map(|t| t.id.clone()))
            .chain(dump.switch_types.iter().map(|t| t.id.clone()))
            .chain(dump.inverter_types.iter().map(|t| t.id.clone()))
            .collect();
        let current_ids: BTreeSet<String> = self
            .line_types
            .keys()
            .chain(self.cable_types.keys())
            .chain(self.transformer_types.keys())
            .chain(self.switch_types.keys())
            .chain(self.inverter_types.keys())
            .cloned()
            .collect();

        let conflicts: Vec<String> = current_ids
            .iter()
            .filter(|id| referenced_type_ids.contains(*id) && !incoming_ids.contains(*id))
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            return Err(CatalogError::ReplaceConflicts { conflicts });
        }

        let added = incoming_ids.difference(&current_ids).cloned().collect();
        let report = ImportReport {
            added,
            skipped: Vec::new(),
            conflicts: Vec::new(),
        };
        Ok((Self::from_dump(dump)?, report))
    }
}

impl CatalogIndex for CatalogRepository {
    fn has_line_type(&self, id: &str) -> bool {
        self.line_types.contains_key(id)
    }

    fn has_cable_type(&self, id: &str) -> bool {
        self.cable_types.contains_key(id)
    }

    fn has_transformer_type(&self, id: &str) -> bool {
        self.transformer_types.contains_key(id)
    }

    fn has_inverter_type(&self, id: &str) -> bool {
        self.inverter_types.contains_key(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cable(id: &str, name: &str) -> ConductorType {
        ConductorType {
            id: id.to_string(),
            name: name.to_string(),
            r_ohm_per_km: 0.253,
            x_ohm_per_km: 0.073,
            b_us_per_km: 0.0,
            rated_current_a: 310.0,
            r0_ohm_per_km: Some(1.01),
            x0_ohm_per_km: Some(0.29),
        }
    }

    fn transformer(id: &str, name: &str) -> TransformerType {
        TransformerType {
            id: id.to_string(),
            name: name.to_string(),
            rated_power_mva: 25.0,
            voltage_hv_kv: 110.0,
            voltage_lv_kv: 20.0,
            uk_percent: 10.0,
            pk_kw: 120.0,
            i0_percent: 0.5,
            p0_kw: 20.0,
            vector_group: "YNd11".to_string(),
        }
    }

    fn base_repo() -> CatalogRepository {
        CatalogRepository::from_dump(CatalogDump {
            cable_types: vec![cable("XRUHAKXS-120", "XRUHAKXS 120"), cable("YHAKXS-70", "YHAKXS 70")],
            transformer_types: vec![transformer("TR-25", "25 MVA 110/20")],
            ..CatalogDump::default()
        })
        .unwrap()
    }

    #[test]
    fn fingerprint_ignores_assembly_order() {
        let forward = base_repo();
        let reversed = CatalogRepository::from_dump(CatalogDump {
            cable_types: vec![cable("YHAKXS-70", "YHAKXS 70"), cable("XRUHAKXS-120", "XRUHAKXS 120")],
            transformer_types: vec![transformer("TR-25", "25 MVA 110/20")],
            ..CatalogDump::default()
        })
        .unwrap();
        assert_eq!(forward.manifest_fingerprint(), reversed.manifest_fingerprint());
    }

    #[test]
    fn duplicate_id_rejected() {
        let result = CatalogRepository::from_dump(CatalogDump {
            cable_types: vec![cable("K-1", "A"), cable("K-1", "B")],
            ..CatalogDump::default()
        });
        assert!(matches!(result, Err(CatalogError::DuplicateTypeId(_))));
    }

    #[test]
    fn list_sorts_by_name_then_id() {
        let repo = base_repo();
        let listed = repo.list(CatalogCategory::CableTypes);
        assert_eq!(listed[0].0, "XRUHAKXS 120");
        assert_eq!(listed[1].0, "YHAKXS 70");
    }

    #[test]
    fn merge_adds_and_skips() {
        let repo = base_repo();
        let (merged, report) = repo
            .import(
                CatalogDump {
                    cable_types: vec![cable("YHAKXS-70", "Nadpisany"), cable("NOWY-1", "Nowy")],
                    ..CatalogDump::default()
                },
                ImportMode::Merge,
                &BTreeSet::new(),
            )
            .unwrap();
        assert_eq!(report.added, vec!["NOWY-1".to_string()]);
        assert_eq!(report.skipped, vec!["YHAKXS-70".to_string()]);
        // Existing record untouched by the skipped import row.
        assert_eq!(merged.get_cable_type("YHAKXS-70").unwrap().name, "YHAKXS 70");
        assert!(merged.get_cable_type("NOWY-1").is_some());
    }

    #[test]
    fn replace_blocks_on_referenced_removal() {
        let repo = base_repo();
        let referenced: BTreeSet<String> = BTreeSet::from(["YHAKXS-70".to_string()]);
        let result = repo.import(
            CatalogDump {
                cable_types: vec![cable("INNY-1", "Inny")],
                ..CatalogDump::default()
            },
            ImportMode::Replace,
            &referenced,
        );
        match result {
            Err(CatalogError::ReplaceConflicts { conflicts }) => {
                assert_eq!(conflicts, vec!["YHAKXS-70".to_string()]);
            }
            other => panic!("expected ReplaceConflicts, got {other:?}"),
        }
    }

    #[test]
    fn replace_succeeds_when_unreferenced() {
        let repo = base_repo();
        let (replaced, report) = repo
            .import(
                CatalogDump {
                    cable_types: vec![cable("INNY-1", "Inny")],
                    ..CatalogDump::default()
                },
                ImportMode::Replace,
                &BTreeSet::new(),
            )
            .unwrap();
        assert!(replaced.get_cable_type("YHAKXS-70").is_none());
        assert!(report.added.contains(&"INNY-1".to_string()));
    }

    #[test]
    fn export_import_round_trip_preserves_fingerprint() {
        let repo = base_repo();
        let rebuilt = CatalogRepository::from_dump(repo.export_dump()).unwrap();
        assert_eq!(repo.manifest_fingerprint(), rebuilt.manifest_fingerprint());
    }

    #[test]
    fn catalog_index_surface() {
        use mvnet_core::readiness::CatalogIndex;
        let repo = base_repo();
        assert!(repo.has_cable_type("YHAKXS-70"));
        assert!(!repo.has_line_type("YHAKXS-70"));
        assert!(repo.has_transformer_type("TR-25"));
    }
}
