use crate::{
    error::{QuartzBioError, QuartzBioResult},
    filter::{Clause, Filter},
};
use serde_json::{json, Value};

/// Builds filters on genomic coordinates.
///
/// Only meaningful for genomic datasets, whose records carry the standard
/// `genomic_coordinates` fields.
pub struct GenomicFilter;

impl GenomicFilter {
    pub const FIELD_START: &'static str = "genomic_coordinates.start";
    pub const FIELD_STOP: &'static str = "genomic_coordinates.stop";
    pub const FIELD_CHR: &'static str = "genomic_coordinates.chromosome";

    /// Filter on a chromosome and a position or range.
    ///
    /// `stop` defaults to `start`. A non-exact range matches any record that
    /// overlaps it: records containing the range, records starting inside it
    /// and records ending inside it. A single position, or `exact`, matches
    /// both boundaries exactly. A `start` of `None` matches records with no
    /// position, and a `chromosome` of `None` records with no chromosome.
    pub fn new(
        chromosome: Option<&str>,
        start: Option<u64>,
        stop: Option<u64>,
        exact: bool,
    ) -> Filter {
        let stop = stop.or(start);

        let position = match (start, stop) {
            (Some(start), Some(stop)) if !exact && start != stop => {
                let contains = Filter::all(vec![
                    Clause::condition(format!("{}__lte", Self::FIELD_START), start),
                    Clause::condition(format!("{}__gte", Self::FIELD_STOP), stop),
                ]);
                let starts_inside = Filter::range(Self::FIELD_START, start, stop);
                let stops_inside = Filter::range(Self::FIELD_STOP, start, stop);
                contains | starts_inside | stops_inside
            }
            _ => Filter::all(vec![
                Clause::condition(Self::FIELD_START, start.map_or(Value::Null, |s| json!(s))),
                Clause::condition(Self::FIELD_STOP, stop.map_or(Value::Null, |s| json!(s))),
            ]),
        };

        let chromosome = match chromosome {
            Some(chr) => json!(chr.strip_prefix("chr").unwrap_or(chr)),
            None => Value::Null,
        };

        position & Filter::eq(Self::FIELD_CHR, chromosome)
    }

    /// Filter on a single position
    pub fn position(chromosome: &str, position: u64, exact: bool) -> Filter {
        Self::new(Some(chromosome), Some(position), None, exact)
    }

    /// Like [`GenomicFilter::new`], with positions given as text.
    /// Thousands separators are accepted.
    pub fn from_positions(
        chromosome: Option<&str>,
        start: Option<&str>,
        stop: Option<&str>,
        exact: bool,
    ) -> QuartzBioResult<Filter> {
        let start = start.map(parse_position).transpose()?;
        let stop = stop.map(parse_position).transpose()?;
        Ok(Self::new(chromosome, start, stop, exact))
    }

    /// Parse a UCSC-style region, `chr1:100-200` or `chr1:100`
    pub fn from_string(region: &str, exact: bool) -> QuartzBioResult<Filter> {
        let (chromosome, pos) = match region.split(':').collect::<Vec<_>>().as_slice() {
            [chromosome, pos] => (*chromosome, *pos),
            _ => {
                return Err(QuartzBioError::invalid_param(
                    "Please use UCSC-style format: \"chr2:1000-2000\"",
                ))
            }
        };

        match pos.split('-').collect::<Vec<_>>().as_slice() {
            [position] => Self::from_positions(Some(chromosome), Some(*position), None, exact),
            [start, stop] => {
                Self::from_positions(Some(chromosome), Some(*start), Some(*stop), exact)
            }
            _ => Err(QuartzBioError::invalid_param(format!(
                "Invalid range '{}': use UCSC-style format: \"chr2:1000-2000\"",
                pos
            ))),
        }
    }
}

fn parse_position(text: &str) -> QuartzBioResult<u64> {
    text.trim().replace(',', "").parse().map_err(|_| {
        QuartzBioError::invalid_param(format!(
            "Start and stop positions must be integers (or None), got '{}'",
            text
        ))
    })
}
