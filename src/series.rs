use crate::errors::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use std::{collections::HashMap, fs::File, io::Read, path::Path};

pub const SITE_COLUMN: &str = "website";

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

/// Daily observations for one site. Dates are strictly increasing and values
/// are finite, non-negative counts.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Result<Self> {
        if dates.len() != values.len() {
            return Err(ForecastError::InvalidInput(format!(
                "{} dates but {} values",
                dates.len(),
                values.len()
            )));
        }
        if let Some(pair) = dates.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(ForecastError::InvalidInput(format!(
                "dates must be strictly increasing ({} then {})",
                pair[0], pair[1]
            )));
        }
        if let Some(bad) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(ForecastError::InvalidInput(format!(
                "values must be finite non-negative counts, found {bad}"
            )));
        }
        Ok(Self { dates, values })
    }

    /// Builds a series of consecutive days starting at `start`.
    pub fn daily(start: NaiveDate, values: Vec<f64>) -> Result<Self> {
        let dates = (0..values.len())
            .map(|offset| start + Duration::days(offset as i64))
            .collect();
        Self::new(dates, values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// The first `len` observations as a new series.
    pub fn prefix(&self, len: usize) -> TimeSeries {
        let len = len.min(self.len());
        TimeSeries {
            dates: self.dates[..len].to_vec(),
            values: self.values[..len].to_vec(),
        }
    }

    /// The last `len` observations as a new series.
    pub fn tail(&self, len: usize) -> TimeSeries {
        let start = self.len().saturating_sub(len);
        TimeSeries {
            dates: self.dates[start..].to_vec(),
            values: self.values[start..].to_vec(),
        }
    }

    /// A copy of this series with one more observation at the end.
    pub fn with_appended(&self, date: NaiveDate, value: f64) -> Result<TimeSeries> {
        let mut dates = self.dates.clone();
        let mut values = self.values.clone();
        dates.push(date);
        values.push(value);
        TimeSeries::new(dates, values)
    }
}

/// Row-per-site, column-per-date traffic table.
#[derive(Debug, Clone)]
pub struct WideTable {
    dates: Vec<NaiveDate>,
    sites: Vec<String>,
    cells: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl WideTable {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
        let headers = reader
            .headers()
            .map_err(|err| ForecastError::InvalidInput(err.to_string()))?
            .clone();

        let site_idx = headers
            .iter()
            .position(|h| h == SITE_COLUMN)
            .ok_or_else(|| {
                ForecastError::InvalidInput(format!("CSV must have a '{SITE_COLUMN}' column"))
            })?;

        let mut date_columns = Vec::with_capacity(headers.len().saturating_sub(1));
        for (idx, label) in headers.iter().enumerate() {
            if idx == site_idx {
                continue;
            }
            date_columns.push((idx, parse_date(label)?));
        }

        let mut seen = date_columns.iter().map(|(_, d)| *d).collect::<Vec<_>>();
        seen.sort();
        if let Some(pair) = seen.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(ForecastError::InvalidInput(format!(
                "duplicate date column {}",
                pair[0]
            )));
        }

        let mut sites = Vec::new();
        let mut cells = Vec::new();
        let mut index = HashMap::new();
        for record in reader.records() {
            let record = record.map_err(|err| ForecastError::InvalidInput(err.to_string()))?;
            let site = record.get(site_idx).unwrap_or_default().to_string();
            if index.insert(site.clone(), sites.len()).is_some() {
                return Err(ForecastError::InvalidInput(format!(
                    "duplicate site identity '{site}'"
                )));
            }
            let row = date_columns
                .iter()
                .map(|(idx, _)| record.get(*idx).unwrap_or_default().to_string())
                .collect();
            sites.push(site);
            cells.push(row);
        }

        Ok(Self {
            dates: date_columns.into_iter().map(|(_, d)| d).collect(),
            sites,
            cells,
            index,
        })
    }

    pub fn sites(&self) -> &[String] {
        &self.sites
    }

    pub fn contains(&self, site: &str) -> bool {
        self.index.contains_key(site)
    }

    /// Transposes one site's row into a date-sorted series.
    pub fn series_for_site(&self, site: &str) -> Result<TimeSeries> {
        let row = self
            .index
            .get(site)
            .map(|&idx| &self.cells[idx])
            .ok_or_else(|| ForecastError::KeyNotFound(site.to_string()))?;

        let mut points = Vec::with_capacity(row.len());
        for (date, cell) in self.dates.iter().zip(row) {
            let value = cell.parse::<f64>().map_err(|_| {
                ForecastError::InvalidInput(format!("site '{site}' has non-numeric value '{cell}' on {date}"))
            })?;
            points.push((*date, value));
        }
        points.sort_by_key(|(date, _)| *date);

        let (dates, values) = points.into_iter().unzip();
        TimeSeries::new(dates, values)
    }
}

pub fn load_wide_csv(path: &Path) -> Result<WideTable> {
    let file = File::open(path).map_err(|err| {
        ForecastError::InvalidInput(format!("cannot open {}: {err}", path.display()))
    })?;
    WideTable::from_reader(file)
}

pub fn get_series_for_site(table: &WideTable, site: &str) -> Result<TimeSeries> {
    table.series_for_site(site)
}

fn parse_date(label: &str) -> Result<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(label, fmt).ok())
        .ok_or_else(|| ForecastError::InvalidInput(format!("column '{label}' is not a date")))
}
