//! Integration tests for DFP archive decoding and statement extraction.

use approx::assert_relative_eq;
use recife_data::cvm::{
    DfpArchive, StatementKind, extract_controlling_equity, extract_net_income, normalize_cnpj,
};
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;

const HEADER: &str = "CNPJ_CIA;DT_REFER;VERSAO;DENOM_CIA;CD_CVM;GRUPO_DFP;MOEDA;ESCALA_MOEDA;ORDEM_EXERC;DT_INI_EXERC;DT_FIM_EXERC;CD_CONTA;DS_CONTA;VL_CONTA;ST_CONTA_FIXA";

fn dre_csv() -> String {
    [
        HEADER,
        "60.872.504/0001-23;2023-12-31;1;ITAU UNIBANCO HOLDING S.A.;19348;DF Consolidado - Demonstração do Resultado;REAL;MIL;ÚLTIMO;2023-01-01;2023-12-31;3.11;Lucro/Prejuízo Consolidado do Período;35600000.0000000000;S",
        "60.872.504/0001-23;2023-12-31;1;ITAU UNIBANCO HOLDING S.A.;19348;DF Consolidado - Demonstração do Resultado;REAL;MIL;ÚLTIMO;2023-01-01;2023-12-31;3.11.01;Atribuído a Sócios da Empresa Controladora;33100000.0000000000;S",
        "60.872.504/0001-23;2023-12-31;1;ITAU UNIBANCO HOLDING S.A.;19348;DF Consolidado - Demonstração do Resultado;REAL;MIL;PENÚLTIMO;2022-01-01;2022-12-31;3.11;Lucro/Prejuízo Consolidado do Período;30700000.0000000000;S",
        "00.000.000/0001-91;2023-12-31;1;BCO BRASIL S.A.;1023;DF Consolidado - Demonstração do Resultado;REAL;MIL;ÚLTIMO;2023-01-01;2023-12-31;3.11;Lucro/Prejuízo Consolidado do Período;35500000.0000000000;S",
    ]
    .join("\n")
}

fn bpp_csv() -> String {
    [
        HEADER,
        "60.872.504/0001-23;2023-12-31;1;ITAU UNIBANCO HOLDING S.A.;19348;DF Consolidado - Balanço Patrimonial Passivo;REAL;MIL;ÚLTIMO;;2023-12-31;2.08;Patrimônio Líquido Consolidado;190000000.0000000000;S",
        "60.872.504/0001-23;2023-12-31;1;ITAU UNIBANCO HOLDING S.A.;19348;DF Consolidado - Balanço Patrimonial Passivo;REAL;MIL;ÚLTIMO;;2023-12-31;2.08.09;Participação dos Acionistas Não Controladores;8000000.0000000000;S",
    ]
    .join("\n")
}

fn latin1(text: &str) -> Vec<u8> {
    text.chars().map(|c| c as u32 as u8).collect()
}

fn build_archive(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for (name, bytes) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

fn sample_archive() -> DfpArchive {
    let bytes = build_archive(&[
        ("dfp_cia_aberta_2023.csv", b"irrelevant".to_vec()),
        ("dfp_cia_aberta_DRE_ind_2023.csv", latin1(&dre_csv())),
        ("dfp_cia_aberta_DRE_con_2023.csv", latin1(&dre_csv())),
        ("dfp_cia_aberta_BPP_con_2023.csv", bpp_csv().into_bytes()),
    ]);
    DfpArchive::from_bytes(2023, bytes).unwrap()
}

#[test]
fn test_consolidated_entry_selection() {
    let archive = sample_archive();
    assert_eq!(archive.year(), 2023);
    assert_eq!(archive.entry_names().len(), 4);
    assert_eq!(
        archive.consolidated_entry(StatementKind::Income).as_deref(),
        Some("dfp_cia_aberta_DRE_con_2023.csv")
    );
    assert_eq!(
        archive
            .consolidated_entry(StatementKind::BalanceSheetLiabilities)
            .as_deref(),
        Some("dfp_cia_aberta_BPP_con_2023.csv")
    );
}

#[test]
fn test_latin1_income_statement() {
    let mut archive = sample_archive();
    let records = archive.statement(StatementKind::Income).unwrap();
    assert_eq!(records.len(), 4);
    assert!(records.iter().any(|r| r.description.contains("Sócios")));

    let income = extract_net_income(&records, "60872504000123");
    assert_eq!(income.len(), 1);
    assert_relative_eq!(income[&2023], 33_100_000_000.0);

    let bb = extract_net_income(&records, "00.000.000/0001-91");
    assert_relative_eq!(bb[&2023], 35_500_000_000.0);
}

#[test]
fn test_utf8_balance_sheet() {
    let mut archive = sample_archive();
    let records = archive
        .statement(StatementKind::BalanceSheetLiabilities)
        .unwrap();
    let equity = extract_controlling_equity(&records, "60.872.504/0001-23");
    assert_relative_eq!(equity[&2023], 182_000_000_000.0);
}

#[test]
fn test_broken_row_of_untracked_issuer_keeps_the_year() {
    let csv = [
        bpp_csv().as_str(),
        "11.111.111/0001-11;2023-12-31;1;CIA QUALQUER S.A.;99999;DF Consolidado - Balanço Patrimonial Passivo;REAL;MIL;ÚLTIMO;;2023-12-31;2.08;Patrimônio Líquido Consolidado;;S",
    ]
    .join("\n");
    let bytes = build_archive(&[("dfp_cia_aberta_BPP_con_2023.csv", csv.into_bytes())]);
    let mut archive = DfpArchive::from_bytes(2023, bytes).unwrap();

    let itau = normalize_cnpj("60.872.504/0001-23");
    let records = archive
        .statement_for(StatementKind::BalanceSheetLiabilities, |cnpj| {
            normalize_cnpj(cnpj) == itau
        })
        .unwrap();

    assert_eq!(records.len(), 2);
    let equity = extract_controlling_equity(&records, "60.872.504/0001-23");
    assert_relative_eq!(equity[&2023], 182_000_000_000.0);
}

#[test]
fn test_missing_statement_is_empty() {
    let bytes = build_archive(&[("dfp_cia_aberta_2015.csv", b"x".to_vec())]);
    let mut archive = DfpArchive::from_bytes(2015, bytes).unwrap();
    assert!(archive.statement(StatementKind::Income).unwrap().is_empty());
}

#[test]
fn test_corrupt_archive_is_rejected() {
    assert!(DfpArchive::from_bytes(2020, b"not a zip".to_vec()).is_err());
}
