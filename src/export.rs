//! Daily report documents: plain text and JSON for today, CSV for any day
//! present in the daily reports.
//!
//! Figures come from [`crate::revenue`]; nothing here recomputes revenue.

use crate::models::{DailyReport, EntryRecord};
use crate::revenue::DayRevenue;
use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Weekday};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Write};
use thiserror::Error;

pub const SYSTEM_NAME: &str = "FabLab Parking Control";
const NOT_RECORDED: &str = "Não registrado";
const PAID: &str = "PAGO";
const NOTE: &str =
    "Todos os carros que entraram já pagaram na entrada. A receita não é afetada quando carros saem.";
const RULE: &str = "═══════════════════════════════════════════════════════════";
const ENTRY_RULE: &str = "───────────────────────────────────────────────────────";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Nenhum dado disponível para exportar. Não há carros registrados hoje.")]
    NothingToExport,
    #[error("Nenhum relatório encontrado para a data {0}.")]
    ReportNotFound(NaiveDate),
    #[error("Erro ao buscar dados do banco. Verifique sua conexão. ({0})")]
    BackendUnavailable(String),
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Txt,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub name: String,
    pub content_type: &'static str,
    pub body: String,
}

impl IntoResponse for ExportFile {
    fn into_response(self) -> Response {
        (
            [
                (header::CONTENT_TYPE, self.content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", self.name),
                ),
            ],
            self.body,
        )
            .into_response()
    }
}

/// What today's export is built from: the aggregator's figures and, when
/// known, the entries behind them.
#[derive(Debug, Clone)]
pub struct ExportInput {
    pub figures: DayRevenue,
    pub entries: Option<Vec<EntryRecord>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportDocument {
    #[serde(rename = "informacoes_gerais")]
    pub general: GeneralInfo,
    #[serde(rename = "resumo_financeiro")]
    pub financial: FinancialSummary,
    #[serde(rename = "estatisticas")]
    pub statistics: Statistics,
    #[serde(rename = "detalhamento_carros")]
    pub cars: Vec<CarLine>,
    #[serde(rename = "observacoes")]
    pub notes: Notes,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneralInfo {
    #[serde(rename = "data")]
    pub date: NaiveDate,
    #[serde(rename = "data_formatada")]
    pub date_long: String,
    #[serde(rename = "data_geracao")]
    pub generated_at: String,
    #[serde(rename = "sistema")]
    pub system: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialSummary {
    #[serde(rename = "total_carros")]
    pub total_cars: u32,
    #[serde(rename = "receita_total", with = "rust_decimal::serde::float")]
    pub revenue: Decimal,
    #[serde(rename = "valor_por_carro", with = "rust_decimal::serde::float")]
    pub price_per_car: Decimal,
    #[serde(rename = "receita_esperada", with = "rust_decimal::serde::float")]
    pub expected_revenue: Decimal,
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    #[serde(rename = "primeiro_carro_horario")]
    pub first_car: Option<String>,
    #[serde(rename = "ultimo_carro_horario")]
    pub last_car: Option<String>,
    #[serde(rename = "total_horas_atividade")]
    pub active_hours: i64,
    #[serde(rename = "media_carros_por_hora", with = "rust_decimal::serde::float")]
    pub cars_per_hour: Decimal,
    #[serde(rename = "receita_por_hora", with = "rust_decimal::serde::float")]
    pub revenue_per_hour: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarLine {
    #[serde(rename = "numero_sequencial")]
    pub sequence: usize,
    #[serde(rename = "id_registro", skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(rename = "horario_entrada")]
    pub entered_at: String,
    #[serde(rename = "horario_entrada_iso", skip_serializing_if = "Option::is_none")]
    pub entered_at_iso: Option<String>,
    #[serde(rename = "valor_pago", with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    #[serde(rename = "status_pagamento")]
    pub status: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notes {
    #[serde(rename = "nota")]
    pub note: &'static str,
    #[serde(rename = "total_registros")]
    pub total_records: u32,
    #[serde(rename = "validacao")]
    pub validation: &'static str,
}

/// Shown to the operator once both files are ready.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSummary {
    pub total_carros: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub valor_faturado: Decimal,
    pub arquivos: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportPayload {
    pub date: NaiveDate,
    pub document: ReportDocument,
    pub text: String,
    pub json: String,
}

impl ExportPayload {
    pub fn file(&self, format: ExportFormat) -> ExportFile {
        match format {
            ExportFormat::Txt => ExportFile {
                name: format!("relatorio_{}.txt", self.date),
                content_type: "text/plain; charset=utf-8",
                body: self.text.clone(),
            },
            ExportFormat::Json => ExportFile {
                name: format!("relatorio_{}.json", self.date),
                content_type: "application/json; charset=utf-8",
                body: self.json.clone(),
            },
        }
    }

    pub fn summary(&self) -> ExportSummary {
        ExportSummary {
            total_carros: self.document.financial.total_cars,
            valor_faturado: self.document.financial.revenue,
            arquivos: format!("relatorio_{}.txt e .json", self.date),
        }
    }
}

/// Builds today's text and JSON report.
///
/// Real entries are listed oldest first; when fewer are known than the
/// reported count, placeholder rows make up the difference.
pub fn build_today_export<Tz>(
    input: &ExportInput,
    generated_at: &DateTime<Tz>,
    price: Decimal,
) -> Result<ExportPayload, ExportError>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let figures = &input.figures;
    if figures.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let tz = generated_at.timezone();
    let mut entries = input.entries.clone().unwrap_or_default();
    entries.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut cars: Vec<CarLine> = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| CarLine {
            sequence: index + 1,
            record_id: Some(entry.id.clone()),
            entered_at: format_datetime_br(&entry.created_at.with_timezone(&tz)),
            entered_at_iso: Some(entry.created_at.to_rfc3339()),
            amount: entry.amount_or(price),
            status: PAID,
        })
        .collect();
    for sequence in cars.len() + 1..=figures.count as usize {
        cars.push(CarLine {
            sequence,
            record_id: None,
            entered_at: NOT_RECORDED.to_string(),
            entered_at_iso: None,
            amount: price,
            status: PAID,
        });
    }

    let first = entries.first().map(|e| e.created_at.with_timezone(&tz));
    let last = entries.last().map(|e| e.created_at.with_timezone(&tz));
    let active_hours = match (&first, &last) {
        (Some(first), Some(last)) => {
            let seconds = (last.clone() - first.clone()).num_seconds();
            ((seconds + 3599) / 3600).max(1)
        }
        _ => 1,
    };
    let hours = Decimal::from(active_hours);
    let expected_revenue = price * Decimal::from(figures.count);

    let document = ReportDocument {
        general: GeneralInfo {
            date: figures.date,
            date_long: format_date_long_br(figures.date),
            generated_at: format_datetime_br(generated_at),
            system: SYSTEM_NAME,
        },
        financial: FinancialSummary {
            total_cars: figures.count,
            revenue: figures.revenue.round_dp(2),
            price_per_car: price,
            expected_revenue,
            status: if figures.revenue == expected_revenue {
                "OK"
            } else {
                "Verificar"
            },
        },
        statistics: Statistics {
            first_car: first.as_ref().map(format_datetime_br),
            last_car: last.as_ref().map(format_datetime_br),
            active_hours,
            cars_per_hour: (Decimal::from(figures.count) / hours).round_dp(2),
            revenue_per_hour: (figures.revenue / hours).round_dp(2),
        },
        cars,
        notes: Notes {
            note: NOTE,
            total_records: figures.count,
            validation: "Relatório gerado automaticamente pelo sistema",
        },
    };

    let json = serde_json::to_string_pretty(&document)?;
    let text = render_text(&document, price);
    Ok(ExportPayload {
        date: figures.date,
        document,
        text,
        json,
    })
}

fn render_text(document: &ReportDocument, price: Decimal) -> String {
    let mut out = String::new();
    let section = |out: &mut String, title: &str| {
        let _ = writeln!(out, "{RULE}\n{title:^59}\n{RULE}\n");
    };

    section(&mut out, "RELATÓRIO DE ESTACIONAMENTO");
    let _ = writeln!(out, "Data: {}", document.general.date_long);
    let _ = writeln!(out, "Data de Geração: {}", document.general.generated_at);
    let _ = writeln!(out, "Sistema: {}\n", document.general.system);

    section(&mut out, "RESUMO FINANCEIRO");
    let _ = writeln!(out, "Total de Carros que Entraram: {}", document.financial.total_cars);
    let _ = writeln!(out, "Valor Faturado: R$ {:.2}", document.financial.revenue);
    let _ = writeln!(out, "Valor por Carro: R$ {price:.2}\n");

    section(&mut out, "DETALHAMENTO DE ENTRADAS");
    let lines: Vec<String> = document
        .cars
        .iter()
        .map(|car| {
            format!(
                "{n}. Carro #{n}\n   Horário de Entrada: {}\n   Valor Pago: R$ {:.2}\n   Status: {}\n   {ENTRY_RULE}",
                car.entered_at,
                car.amount,
                car.status,
                n = car.sequence,
            )
        })
        .collect();
    let _ = writeln!(out, "{}\n", lines.join("\n\n"));

    section(&mut out, "ESTATÍSTICAS");
    let na = || "N/A".to_string();
    let _ = writeln!(
        out,
        "Primeiro Carro: {}",
        document.statistics.first_car.clone().unwrap_or_else(na)
    );
    let _ = writeln!(
        out,
        "Último Carro: {}\n",
        document.statistics.last_car.clone().unwrap_or_else(na)
    );

    section(&mut out, "OBSERVAÇÕES");
    let _ = writeln!(out, "Todos os carros que entraram já pagaram na entrada.");
    let _ = writeln!(out, "A receita não é afetada quando carros saem.\n");
    let _ = writeln!(out, "Relatório gerado automaticamente pelo sistema.\n");
    out.push_str(RULE);
    out
}

/// CSV for one day of the daily reports: header plus a single data row.
pub fn daily_csv(reports: &[DailyReport], date: NaiveDate) -> Result<ExportFile, ExportError> {
    let report = reports
        .iter()
        .find(|report| report.date == date)
        .ok_or(ExportError::ReportNotFound(date))?;
    Ok(ExportFile {
        name: format!("relatorio_{}.csv", report.date),
        content_type: "text/csv; charset=utf-8",
        body: format!(
            "Data,Total de Entradas,Receita Total (R$)\n{},{},{:.2}",
            report.date, report.total_entries, report.total_revenue
        ),
    })
}

pub fn format_datetime_br<Tz>(value: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    value.format("%d/%m/%Y, %H:%M:%S").to_string()
}

pub fn format_date_long_br(date: NaiveDate) -> String {
    let weekday = match date.weekday() {
        Weekday::Mon => "segunda-feira",
        Weekday::Tue => "terça-feira",
        Weekday::Wed => "quarta-feira",
        Weekday::Thu => "quinta-feira",
        Weekday::Fri => "sexta-feira",
        Weekday::Sat => "sábado",
        Weekday::Sun => "domingo",
    };
    const MONTHS: [&str; 12] = [
        "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho", "agosto", "setembro",
        "outubro", "novembro", "dezembro",
    ];
    format!(
        "{weekday}, {} de {} de {}",
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}
