//! CSV export of prediction records.
//!
//! Output format is fixed: currency columns carry a rupee sign with thousands
//! separators, tenure is suffixed with "months", the label renders as
//! `Churn` / `No Churn`, and timestamps use `YYYY-MM-DD HH:MM:SS`. Identical
//! input always produces identical bytes.

use crate::db::models::predictions::PredictionDBResponse;
use crate::errors::{Error, Result};
use chrono::{DateTime, Utc};

/// Fixed export header
pub const EXPORT_HEADER: [&str; 9] = [
    "Customer Name",
    "Tenure (Months)",
    "Monthly Charges (₹)",
    "Total Charges (₹)",
    "Contract Type",
    "Payment Method",
    "Prediction",
    "Risk Score/Probability",
    "Date",
];

/// Render records to CSV bytes (UTF-8), header first, one row per record.
pub fn render_csv(records: &[PredictionDBResponse]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    writer.write_record(EXPORT_HEADER).map_err(|e| Error::Internal {
        operation: format!("write CSV header: {e}"),
    })?;

    for record in records {
        writer
            .write_record([
                record.customer_name.clone(),
                format_tenure(record.tenure),
                format_inr(record.monthly_charges),
                format_inr(record.total_charges),
                record.contract_type.clone(),
                record.payment_method.clone(),
                if record.prediction == 1 { "Churn" } else { "No Churn" }.to_string(),
                format!("{}% ({:.3})", record.risk_score, record.probability),
                record.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            ])
            .map_err(|e| Error::Internal {
                operation: format!("write CSV row: {e}"),
            })?;
    }

    let bytes = writer.into_inner().map_err(|e| Error::Internal {
        operation: format!("flush CSV: {e}"),
    })?;

    String::from_utf8(bytes).map_err(|e| Error::Internal {
        operation: format!("encode CSV: {e}"),
    })
}

/// Attachment filename for an export generated at `now`.
pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("churn_predictions_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Rupee amount rounded to whole units with thousands separators.
pub fn format_inr(value: f64) -> String {
    let rounded = value.round() as i64;
    let digits = rounded.abs().to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    let grouped: String = grouped.chars().rev().collect();

    if rounded < 0 { format!("₹-{grouped}") } else { format!("₹{grouped}") }
}

fn format_tenure(tenure: f64) -> String {
    if tenure.fract() == 0.0 {
        format!("{} months", tenure as i64)
    } else {
        format!("{tenure} months")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn record(name: &str, prediction: i32) -> PredictionDBResponse {
        PredictionDBResponse {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            customer_name: name.to_string(),
            tenure: 12.0,
            monthly_charges: 1234.56,
            total_charges: 2283300.4,
            contract_type: "One year".to_string(),
            payment_method: "UPI".to_string(),
            prediction,
            probability: 0.725,
            risk_score: 73,
            created_at: Utc.with_ymd_and_hms(2024, 3, 15, 9, 5, 7).unwrap(),
        }
    }

    #[test]
    fn inr_formatting_groups_thousands() {
        assert_eq!(format_inr(0.0), "₹0");
        assert_eq!(format_inr(999.4), "₹999");
        assert_eq!(format_inr(1234.56), "₹1,235");
        assert_eq!(format_inr(2283300.4), "₹2,283,300");
        assert_eq!(format_inr(1_000_000.0), "₹1,000,000");
    }

    #[test]
    fn header_is_exact() {
        let csv = render_csv(&[]).unwrap();
        assert_eq!(
            csv.lines().next().unwrap(),
            "Customer Name,Tenure (Months),Monthly Charges (₹),Total Charges (₹),\
             Contract Type,Payment Method,Prediction,Risk Score/Probability,Date"
        );
    }

    #[test]
    fn row_rendering_is_exact() {
        let csv = render_csv(&[record("Acme", 1)]).unwrap();
        let row = csv.lines().nth(1).unwrap();
        assert_eq!(
            row,
            "Acme,12 months,\"₹1,235\",\"₹2,283,300\",One year,UPI,Churn,73% (0.725),2024-03-15 09:05:07"
        );
    }

    #[test]
    fn no_churn_label() {
        let csv = render_csv(&[record("Globex", 0)]).unwrap();
        assert!(csv.lines().nth(1).unwrap().contains(",No Churn,"));
    }

    #[test]
    fn identical_input_identical_output() {
        let records = vec![record("A", 1), record("B", 0)];
        assert_eq!(render_csv(&records).unwrap(), render_csv(&records).unwrap());
    }

    #[test]
    fn filename_shape() {
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 9, 5, 7).unwrap();
        assert_eq!(export_filename(now), "churn_predictions_20240315_090507.csv");
    }

    #[test]
    fn fractional_tenure_keeps_fraction() {
        assert_eq!(format_tenure(6.5), "6.5 months");
        assert_eq!(format_tenure(24.0), "24 months");
    }

    #[test]
    fn export_reimports_to_equivalent_inputs() {
        use crate::import::process_batch;
        use crate::ml::{risk_score, Classifier, CustomerProfile, PredictionOutcome};

        struct Coin;

        impl Classifier for Coin {
            fn predict(&self, _profile: &CustomerProfile) -> PredictionOutcome {
                PredictionOutcome {
                    prediction: 1,
                    probability: 0.5,
                    risk_score: risk_score(0.5),
                }
            }
        }

        // whole-rupee amounts: the export rounds currency to whole units
        let mut ravi = record("Ravi", 1);
        ravi.tenure = 2.0;
        ravi.monthly_charges = 3000.0;
        ravi.total_charges = 6000.0;
        let mut meera = record("Meera", 0);
        meera.tenure = 24.0;
        meera.monthly_charges = 1450.0;
        meera.total_charges = 1234567.0;
        let records = vec![ravi, meera];

        let exported = render_csv(&records).unwrap();

        // strip the display formatting and map the header back to import columns
        let mut reader = csv::Reader::from_reader(exported.as_bytes());
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer
            .write_record([
                "customer_name",
                "tenure",
                "monthly_charges",
                "total_charges",
                "contract_type",
                "payment_method",
            ])
            .unwrap();
        for row in reader.records() {
            let row = row.unwrap();
            writer
                .write_record([
                    row[0].to_string(),
                    row[1].trim_end_matches(" months").to_string(),
                    row[2].replace(['₹', ','], ""),
                    row[3].replace(['₹', ','], ""),
                    row[4].to_string(),
                    row[5].to_string(),
                ])
                .unwrap();
        }
        let reimport = writer.into_inner().unwrap();

        let outcome = process_batch(&reimport, &Coin, Uuid::new_v4()).unwrap();
        assert_eq!(outcome.success_count, records.len());
        assert_eq!(outcome.error_count, 0);
        for (staged, original) in outcome.staged.iter().zip(&records) {
            assert_eq!(staged.customer_name, original.customer_name);
            assert_eq!(staged.tenure, original.tenure);
            assert_eq!(staged.monthly_charges, original.monthly_charges);
            assert_eq!(staged.total_charges, original.total_charges);
            assert_eq!(staged.contract_type, original.contract_type);
            assert_eq!(staged.payment_method, original.payment_method);
        }
    }
}
