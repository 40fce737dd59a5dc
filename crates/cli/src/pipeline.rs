//! Stage orchestration.
//!
//! Stage A (`consolidate`) turns the raw corpus into the consolidated
//! archive. Stage B (`validate`) joins that archive against the registry and
//! writes the delivery archive. Stages run strictly one file at a time.

use std::fs;
use std::path::Path;

use healthops_config::PipelineConfig;
use healthops_io::{
    csv as delimited, discover, pack, read_consolidated_archive, write_aggregate_file,
    write_detailed_file, ArchiveEntry, ConsolidatedWriter, WrittenDataset,
};
use healthops_recon::{aggregate, normalize_table, reconcile, Registry};

use crate::fetch::{self, RegistrySource};
use crate::report::{ConsolidateReport, DatasetReport, FileFailure, RunReport, ValidateReport};
use crate::CliError;

fn remove_stale(path: &Path) -> Result<(), CliError> {
    if path.exists() {
        fs::remove_file(path)
            .map_err(|e| CliError::io(format!("cannot remove stale {}: {e}", path.display())))?;
        log::debug!("removed stale {}", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Stage A
// ---------------------------------------------------------------------------

/// Consolidate the corpus. A run that accepts no rows writes no archive and
/// leaves `archive` unset in the report.
/// Outputs of any earlier run, stage B's included, are removed first.
pub fn consolidate(config: &PipelineConfig) -> Result<ConsolidateReport, CliError> {
    let out = &config.output;
    let policy = config.normalize.positivity;
    let archive_path = out.consolidated_archive_path();
    for stale in [
        archive_path.clone(),
        out.delivery_archive_path(),
        out.detailed_path(),
        out.aggregate_path(),
    ] {
        remove_stale(&stale)?;
    }

    let files = discover(&config.input.corpus_dir).map_err(CliError::io)?;
    log::info!("found {} source files under {}", files.len(), config.input.corpus_dir.display());

    let mut report = ConsolidateReport { files_scanned: files.len(), ..Default::default() };
    let mut writer = ConsolidatedWriter::create(&out.staging_path()).map_err(CliError::io)?;

    for file in &files {
        let table = match file.read() {
            Ok(table) => table,
            Err(message) => {
                log::warn!("{}: unreadable: {message}", file.path.display());
                report.reject(&file.path, FileFailure::Unreadable { message });
                continue;
            }
        };

        let outcome = normalize_table(&table, &file.path, policy);
        if let Some(reason) = outcome.rejection {
            log::info!("{}: skipped ({reason})", file.path.display());
            report.reject(&file.path, FileFailure::Rejected { reason });
            continue;
        }

        writer.append(&outcome.records).map_err(CliError::io)?;
        report.files_accepted += 1;
        report.add_rows(&outcome.stats, outcome.records.len());
        log::info!(
            "{}: {} rows accepted ({} matched of {} read)",
            file.path.display(),
            outcome.records.len(),
            outcome.stats.rows_matched,
            outcome.stats.rows_read,
        );
    }

    let staging = writer.path().to_path_buf();
    let rows = writer.finish().map_err(CliError::io)?;
    if rows == 0 {
        log::warn!("no rows accepted from {} files; nothing archived", report.files_scanned);
        return Ok(report);
    }

    pack(&archive_path, &[ArchiveEntry::new(out.consolidated_entry(), &staging)]).map_err(CliError::io)?;
    report.archive = Some(archive_path.display().to_string());
    Ok(report)
}

// ---------------------------------------------------------------------------
// Stage B
// ---------------------------------------------------------------------------

fn load_registry(source: &RegistrySource) -> Result<Registry, CliError> {
    let table = delimited::import(&source.path).map_err(CliError::io)?;
    Ok(Registry::from_table(&table)?)
}

fn dataset_report(path: &Path, written: WrittenDataset) -> DatasetReport {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    DatasetReport { name, rows: written.rows, blake3: written.blake3 }
}

/// Validate the consolidated archive against the registry. An archive with
/// no records produces no delivery archive.
pub fn validate(config: &PipelineConfig) -> Result<ValidateReport, CliError> {
    let out = &config.output;
    let consolidated = out.consolidated_archive_path();
    if !consolidated.is_file() {
        return Err(CliError::io(format!("consolidated archive not found: {}", consolidated.display()))
            .with_hint("run `healthops consolidate` first"));
    }
    let delivery = out.delivery_archive_path();
    remove_stale(&delivery)?;

    let source = fetch::acquire(&config.registry)?;
    let registry = load_registry(&source)?;
    let records =
        read_consolidated_archive(&consolidated, &out.consolidated_entry()).map_err(CliError::io)?;
    log::info!("read {} consolidated records", records.len());

    let (joined, join) = reconcile(&records, &registry);
    let mut report = ValidateReport {
        registry_path: source.path.display().to_string(),
        registry_origin: source.origin,
        registry_entries: registry.entries().len(),
        registry_duplicates: registry.duplicates(),
        records: joined.len(),
        matched: join.matched,
        unmatched: join.unmatched,
        cnpj_invalid: joined.iter().filter(|r| !r.flags.cnpj_is_valid).count(),
        legal_name_invalid: joined.iter().filter(|r| !r.flags.legal_name_is_valid).count(),
        amount_invalid: joined.iter().filter(|r| !r.flags.amount_is_valid).count(),
        detailed: None,
        aggregate: None,
        archive: None,
    };
    if joined.is_empty() {
        log::warn!("consolidated archive holds no records; nothing archived");
        return Ok(report);
    }

    let stats = aggregate(&joined);
    log::info!("aggregated {} (legal name, state) groups", stats.len());

    let detailed_path = out.detailed_path();
    let aggregate_path = out.aggregate_path();
    let detailed = write_detailed_file(&detailed_path, &joined).map_err(CliError::io)?;
    let aggregated = write_aggregate_file(&aggregate_path, &stats).map_err(CliError::io)?;
    report.detailed = Some(dataset_report(&detailed_path, detailed));
    report.aggregate = Some(dataset_report(&aggregate_path, aggregated));

    pack(
        &delivery,
        &[
            ArchiveEntry::new(out.detailed_file.as_str(), &detailed_path),
            ArchiveEntry::new(out.aggregate_file.as_str(), &aggregate_path),
        ],
    )
    .map_err(CliError::io)?;
    report.archive = Some(delivery.display().to_string());
    Ok(report)
}

/// Stage A then stage B. Stage B is skipped when stage A accepted nothing.
pub fn run(config: &PipelineConfig) -> Result<RunReport, CliError> {
    let consolidated = consolidate(config)?;
    if consolidated.archive.is_none() {
        return Ok(RunReport { consolidate: Some(consolidated), validate: None });
    }
    let validated = validate(config)?;
    Ok(RunReport { consolidate: Some(consolidated), validate: Some(validated) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes::{EXIT_IO, EXIT_REGISTRY_UNAVAILABLE, EXIT_REGISTRY_UNUSABLE};
    use healthops_io::list_entries;
    use tempfile::{tempdir, TempDir};

    const SOURCE: &str = "DATA;REG_ANS;CD_CONTA_CONTABIL;DESCRICAO;VL_SALDO_FINAL\n\
                          2023-04-01;123456;411111;Eventos/Sinistros Conhecidos;1.500,00\n\
                          2023-04-01;123456;311111;Contraprestacoes;9.999,00\n\
                          2023-07-01;654321;411111;DESPESAS COM EVENTOS INDENIZAVEIS;250,50\n";

    const REGISTRY: &str = "REGISTRO_OPERADORA;CNPJ;Razao_Social;Nome_Fantasia;Modalidade;UF\n\
                            123456;11222333000181;ALFA SAUDE;ALFA;Medicina de Grupo;PE\n";

    fn write(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn setup() -> (TempDir, PipelineConfig) {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(&root.join("raw/2023/2T/despesas.csv"), SOURCE);
        write(&root.join("registry/cadop.csv"), REGISTRY);

        let mut config = PipelineConfig::default();
        config.input.corpus_dir = root.join("raw");
        config.output.dir = root.join("out");
        config.registry.path = Some(root.join("registry/cadop.csv"));
        config.registry.cache_dir = root.join("cache");
        (dir, config)
    }

    #[test]
    fn consolidate_archives_matching_rows() {
        let (_dir, config) = setup();
        let report = consolidate(&config).unwrap();
        assert_eq!(report.files_accepted, 1);
        assert_eq!(report.rows_matched, 2);
        assert_eq!(report.rows_accepted, 2);

        let archive = config.output.consolidated_archive_path();
        assert_eq!(list_entries(&archive).unwrap(), vec!["consolidado_despesas.csv"]);
        assert!(!config.output.staging_path().exists());
    }

    #[test]
    fn consolidate_with_nothing_accepted_writes_no_archive() {
        let (dir, mut config) = setup();
        config.input.corpus_dir = dir.path().join("empty");
        fs::create_dir_all(&config.input.corpus_dir).unwrap();
        write(&config.input.corpus_dir.join("notes.csv"), "A;B\n1;2\n");

        let report = consolidate(&config).unwrap();
        assert_eq!(report.rows_accepted, 0);
        assert_eq!(report.files_rejected.len(), 1);
        assert!(report.archive.is_none());
        assert!(!config.output.consolidated_archive_path().exists());
    }

    #[test]
    fn stale_consolidated_archive_is_removed() {
        let (dir, mut config) = setup();
        write(&config.output.consolidated_archive_path(), "stale");
        config.input.corpus_dir = dir.path().join("empty");
        fs::create_dir_all(&config.input.corpus_dir).unwrap();

        consolidate(&config).unwrap();
        assert!(!config.output.consolidated_archive_path().exists());
    }

    #[test]
    fn zero_row_rerun_removes_previous_delivery() {
        let (dir, config) = setup();
        run(&config).unwrap();
        let delivery = config.output.delivery_archive_path();
        assert!(delivery.exists());

        write(&dir.path().join("raw/2023/2T/despesas.csv"), "A;B\n1;2\n");
        let report = run(&config).unwrap();
        assert_eq!(report.accepted_rows(), 0);
        assert!(report.validate.is_none());
        assert!(!delivery.exists());
        assert!(!config.output.consolidated_archive_path().exists());
    }

    #[test]
    fn consolidate_removes_leftover_stage_b_outputs() {
        let (_dir, config) = setup();
        write(&config.output.detailed_path(), "stale");
        write(&config.output.aggregate_path(), "stale");
        write(&config.output.delivery_archive_path(), "stale");

        consolidate(&config).unwrap();
        assert!(!config.output.detailed_path().exists());
        assert!(!config.output.aggregate_path().exists());
        assert!(!config.output.delivery_archive_path().exists());
    }

    #[test]
    fn run_writes_delivery_archive() {
        let (_dir, config) = setup();
        let report = run(&config).unwrap();
        let validated = report.validate.unwrap();
        assert_eq!(validated.records, 2);
        assert_eq!(validated.matched, 1);
        assert_eq!(validated.unmatched, 1);
        assert_eq!(validated.cnpj_invalid, 1);

        let delivery = config.output.delivery_archive_path();
        assert_eq!(
            list_entries(&delivery).unwrap(),
            vec!["relatorio_final_validado.csv", "despesas_agregadas.csv"]
        );
        assert!(!config.output.detailed_path().exists());
        assert!(!config.output.aggregate_path().exists());
    }

    #[test]
    fn validate_without_consolidated_archive_is_io_error() {
        let (_dir, config) = setup();
        let err = validate(&config).unwrap_err();
        assert_eq!(err.code, EXIT_IO);
        assert!(err.hint.is_some());
    }

    #[test]
    fn missing_registry_is_fatal() {
        let (dir, mut config) = setup();
        consolidate(&config).unwrap();
        config.registry.path = Some(dir.path().join("nope.csv"));
        assert_eq!(validate(&config).unwrap_err().code, EXIT_REGISTRY_UNAVAILABLE);
        assert!(!config.output.delivery_archive_path().exists());
    }

    #[test]
    fn registry_without_key_column_is_unusable() {
        let (dir, mut config) = setup();
        consolidate(&config).unwrap();
        let bad = dir.path().join("registry/bad.csv");
        write(&bad, "CNPJ;Razao_Social\n11222333000181;ALFA\n");
        config.registry.path = Some(bad);
        assert_eq!(validate(&config).unwrap_err().code, EXIT_REGISTRY_UNUSABLE);
    }
}
