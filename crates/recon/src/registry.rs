//! Registry of regulated entities, loaded once per run and read-only after.

use std::collections::HashMap;

use crate::classify::{resolve_column, ColumnRule, HeaderPattern::*};
use crate::error::ReconError;
use crate::model::{RawTable, RegistryEntry};
use crate::reconcile::clean_key;

// Evaluated in declaration order; each rule claims the column it picks.
const KEY_RULE: ColumnRule = ColumnRule {
    tiers: &[
        &[Exact("REGISTRO_OPERADORA")],
        &[ContainsAll(&["REGISTRO", "OPERADORA"])],
        &[Exact("REG_ANS")],
    ],
    exclude: &["DATA"],
};

const CNPJ_RULE: ColumnRule = ColumnRule {
    tiers: &[&[Exact("CNPJ")], &[Contains("CNPJ")]],
    exclude: &[],
};

const NAME_RULE: ColumnRule = ColumnRule {
    tiers: &[&[Exact("RAZAO_SOCIAL")], &[Contains("RAZAO")], &[Contains("NOME")]],
    exclude: &["FANTASIA"],
};

const TRADE_NAME_RULE: ColumnRule = ColumnRule {
    tiers: &[&[Exact("NOME_FANTASIA")], &[Contains("FANTASIA")]],
    exclude: &[],
};

const MODALITY_RULE: ColumnRule = ColumnRule {
    tiers: &[&[Exact("MODALIDADE")], &[Contains("MODALIDADE")]],
    exclude: &[],
};

const STATE_RULE: ColumnRule = ColumnRule {
    tiers: &[&[Exact("UF"), Exact("SG_UF")], &[Contains("ESTADO")], &[Contains("SIGLA")]],
    exclude: &[],
};

const CITY_RULE: ColumnRule = ColumnRule {
    tiers: &[&[Exact("CIDADE")], &[Contains("CIDADE")], &[Contains("MUNICIPIO")]],
    exclude: &[],
};

/// Column indices discovered in a registry table. Only the key is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryColumns {
    pub key: usize,
    pub cnpj: Option<usize>,
    pub legal_name: Option<usize>,
    pub trade_name: Option<usize>,
    pub modality: Option<usize>,
    pub state: Option<usize>,
    pub city: Option<usize>,
}

impl RegistryColumns {
    pub fn discover(headers: &[String]) -> Result<Self, ReconError> {
        let mut claimed = Vec::new();
        let mut take = |rule: &ColumnRule, field: &str| {
            let idx = resolve_column(headers, rule, &claimed, field);
            if let Some(i) = idx {
                claimed.push(i);
            }
            idx
        };

        let key = take(&KEY_RULE, "registry key").ok_or_else(|| {
            ReconError::MissingRegistryColumn { field: "key", headers: headers.to_vec() }
        })?;
        let cnpj = take(&CNPJ_RULE, "cnpj");
        let legal_name = take(&NAME_RULE, "legal name");
        let trade_name = take(&TRADE_NAME_RULE, "trade name");
        let modality = take(&MODALITY_RULE, "modality");
        let state = take(&STATE_RULE, "state");
        let city = take(&CITY_RULE, "city");

        Ok(Self { key, cnpj, legal_name, trade_name, modality, state, city })
    }
}

/// Deduplicated registry, keyed by cleaned registry key.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    entries: Vec<RegistryEntry>,
    index: HashMap<u64, usize>,
    duplicates: usize,
    unkeyed: usize,
}

impl Registry {
    /// Build from a raw registry table. The first row per cleaned key wins;
    /// rows whose key cleans to 0 are skipped.
    pub fn from_table(table: &RawTable) -> Result<Self, ReconError> {
        let headers = table.normalized_headers();
        let cols = RegistryColumns::discover(&headers)?;

        let text = |row: &[String], col: Option<usize>| -> String {
            col.map(|c| row[c].trim().to_string()).unwrap_or_default()
        };

        let mut registry = Registry::default();
        for row in &table.rows {
            let key = clean_key(&row[cols.key]);
            if key == 0 {
                registry.unkeyed += 1;
                continue;
            }
            if registry.index.contains_key(&key) {
                registry.duplicates += 1;
                continue;
            }
            registry.index.insert(key, registry.entries.len());
            registry.entries.push(RegistryEntry {
                registry_key: key,
                cnpj: text(row, cols.cnpj),
                legal_name: text(row, cols.legal_name),
                trade_name: text(row, cols.trade_name),
                modality: text(row, cols.modality),
                city: text(row, cols.city),
                state: text(row, cols.state),
            });
        }

        if registry.entries.is_empty() {
            return Err(ReconError::EmptyRegistry);
        }
        log::info!(
            "registry: {} entries ({} duplicate keys, {} without key)",
            registry.entries.len(),
            registry.duplicates,
            registry.unkeyed
        );
        Ok(registry)
    }

    pub fn get(&self, key: u64) -> Option<&RegistryEntry> {
        self.index.get(&key).map(|&i| &self.entries[i])
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    /// Rows dropped because their key was already taken.
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}
