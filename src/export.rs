use crate::models::ForecastPayload;

pub const CSV_HEADER: [&str; 3] = ["date", "regression_forecast", "seasonal_forecast"];

/// Renders a forecast as CSV, one row per forecast day.
pub fn forecast_csv(forecast: &ForecastPayload) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER)?;

    let rows = forecast
        .rf
        .dates
        .iter()
        .zip(&forecast.rf.values)
        .zip(&forecast.sx.values);
    for ((date, regression), seasonal) in rows {
        writer.write_record([date.clone(), regression.to_string(), seasonal.to_string()])?;
    }

    writer
        .into_inner()
        .map_err(|err| csv::Error::from(err.into_error()))
}

pub fn export_filename(site: &str, horizon: usize) -> String {
    format!("{}_{horizon}day_forecast.csv", crate::storage::safe_name(site))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeriesPayload;

    #[test]
    fn writes_header_and_rows() {
        let forecast = ForecastPayload {
            rf: SeriesPayload {
                dates: vec!["2024-01-01".into(), "2024-01-02".into()],
                values: vec![10.5, 11.0],
            },
            sx: SeriesPayload {
                dates: vec!["2024-01-01".into(), "2024-01-02".into()],
                values: vec![9.25, 0.0],
            },
        };
        let bytes = forecast_csv(&forecast).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "date,regression_forecast,seasonal_forecast");
        assert_eq!(lines[1], "2024-01-01,10.5,9.25");
        assert_eq!(lines[2], "2024-01-02,11,0");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn filename_is_sanitised() {
        assert_eq!(export_filename("a/b.com", 30), "a_b.com_30day_forecast.csv");
    }
}
