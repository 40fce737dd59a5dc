use std::path::PathBuf;

use healthops_recon::model::{CNPJ_NOT_FOUND, LEGAL_NAME_NOT_LOCATED};
use healthops_recon::{
    aggregate, normalize_table, reconcile, PositivityPolicy, Quarter, RawTable, Registry,
};

fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
    RawTable::new(
        headers.iter().map(|s| s.to_string()).collect(),
        rows.iter()
            .map(|r| r.iter().map(|s| s.to_string()).collect())
            .collect(),
    )
}

fn registry() -> Registry {
    Registry::from_table(&table(
        &["Registro_Operadora", "CNPJ", "Razao_Social", "Modalidade", "UF"],
        &[
            &["123456", "11222333000181", "ALFA SAUDE", "Medicina de Grupo", "PE"],
            &["654321", "11444777000161", "BETA ODONTO", "Odontologia de Grupo", "SP"],
            &["123456", "33000167000101", "ALFA REPETIDA", "Cooperativa", "RJ"],
        ],
    ))
    .unwrap()
}

// -------------------------------------------------------------------------
// Normalize -> join -> aggregate
// -------------------------------------------------------------------------

#[test]
fn three_sources_flow_through_the_engine() {
    let dated = table(
        &["DATA", "REG_ANS", "CD_CONTA_CONTABIL", "DESCRICAO", "VL_SALDO_INICIAL", "VL_SALDO_FINAL"],
        &[
            &["2023-01-01", "123456", "41", "EVENTOS/ SINISTROS CONHECIDOS", "0", "1.000,50"],
            &["2023-04-01", "123456", "41", "EVENTOS/ SINISTROS CONHECIDOS", "0", "2.000,00"],
            &["2023-04-01", "123456", "31", "CONTRAPRESTACOES", "0", "9.999,00"],
        ],
    );
    let by_path = table(
        &["reg_ans", "descricao", "valor"],
        &[
            &["654321", "Despesas com Eventos", "300.25"],
            &["777777", "Despesas com Sinistros", "50"],
        ],
    );
    let movement = table(
        &["CD_OPERADORA", "NM_CONTA", "VL_MOVIMENTO", "DT_REGISTRO"],
        &[&["654321", "DESPESA COM EVENTO", "100", "15/08/2023"]],
    );

    let mut records = Vec::new();
    for (t, path) in [
        (&dated, "corpus/2023/1T/a.csv"),
        (&by_path, "corpus/2023/2T/b.csv"),
        (&movement, "corpus/misc/c.xlsx"),
    ] {
        let out = normalize_table(t, &PathBuf::from(path), PositivityPolicy::StrictDrop);
        assert!(out.rejection.is_none(), "{path} rejected");
        records.extend(out.records);
    }
    assert_eq!(records.len(), 5);
    assert_eq!(records[2].quarter, Quarter::Q2);
    assert_eq!(records[4].quarter, Quarter::Q3);

    let (joined, stats) = reconcile(&records, &registry());
    assert_eq!(joined.len(), records.len());
    assert_eq!(stats.unmatched, 1);
    assert_eq!(joined[0].legal_name, "ALFA SAUDE");
    assert_eq!(joined[3].cnpj, CNPJ_NOT_FOUND);
    assert_eq!(joined[3].legal_name, LEGAL_NAME_NOT_LOCATED);

    let groups = aggregate(&joined);
    let names: Vec<&str> = groups.iter().map(|g| g.legal_name.as_str()).collect();
    assert_eq!(names, vec!["ALFA SAUDE", "BETA ODONTO", LEGAL_NAME_NOT_LOCATED]);
    assert_eq!(groups[0].total_cents, 300_050);
    assert_eq!(groups[0].mean_quarterly_cents, 150_025);
    assert_eq!(groups[1].total_cents, 40_025);
}

#[test]
fn suspicious_rows_survive_join_but_not_aggregation() {
    let t = table(
        &["REG_ANS", "DESCRICAO", "VALOR", "DATA"],
        &[
            &["123456", "DESPESAS COM EVENTOS", "10", "2023-01-01"],
            &["123456", "DESPESAS COM EVENTOS", "-3", "2023-02-01"],
            &["123456", "DESPESAS COM EVENTOS", "n/d", "2023-03-01"],
        ],
    );
    let out = normalize_table(&t, &PathBuf::from("x.csv"), PositivityPolicy::FlagSuspicious);
    assert_eq!(out.records.len(), 3);

    let (joined, _) = reconcile(&out.records, &registry());
    let valid: Vec<bool> = joined.iter().map(|j| j.flags.amount_is_valid).collect();
    assert_eq!(valid, vec![true, false, false]);

    let groups = aggregate(&joined);
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].total_cents, 1_000);
}

#[test]
fn registry_dedup_keeps_first_row() {
    let reg = registry();
    assert_eq!(reg.entries().len(), 2);
    assert_eq!(reg.get(123456).unwrap().state, "PE");
}
