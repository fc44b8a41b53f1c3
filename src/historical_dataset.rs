use std::collections::HashSet;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::calibration::{self, Outcome};

const COL_DATE: &str = "Date";
const COL_HOME: &str = "HomeTeam";
const COL_AWAY: &str = "AwayTeam";
const COL_HOME_GOALS: &str = "FTHG";
const COL_AWAY_GOALS: &str = "FTAG";
// Bet365 closing prices first, market average as fallback.
const ODDS_HOME_COLS: [&str; 2] = ["B365H", "AvgH"];
const ODDS_DRAW_COLS: [&str; 2] = ["B365D", "AvgD"];
const ODDS_AWAY_COLS: [&str; 2] = ["B365A", "AvgA"];

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed csv in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{}: missing required column `{column}`", path.display())]
    MissingColumn { path: PathBuf, column: &'static str },
    #[error("{} line {line}: unparsable date `{value}`", path.display())]
    InvalidDate {
        path: PathBuf,
        line: u64,
        value: String,
    },
    #[error("{} line {line}: unparsable goals `{value}`", path.display())]
    InvalidGoals {
        path: PathBuf,
        line: u64,
        value: String,
    },
}

/// Decimal 1X2 prices as quoted by the bookmaker. Any leg may be absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketOdds {
    pub home: Option<f64>,
    pub draw: Option<f64>,
    pub away: Option<f64>,
}

impl MarketOdds {
    pub fn new(home: f64, draw: f64, away: f64) -> Self {
        Self {
            home: Some(home),
            draw: Some(draw),
            away: Some(away),
        }
    }

    pub fn price(&self, outcome: Outcome) -> Option<f64> {
        match outcome {
            Outcome::Home => self.home,
            Outcome::Draw => self.draw,
            Outcome::Away => self.away,
        }
    }
}

/// One finished fixture. Archives hand these to the engine in date order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub league: String,
    pub season: String,
    pub date: NaiveDate,
    pub home: String,
    pub away: String,
    pub home_goals: u8,
    pub away_goals: u8,
    #[serde(default)]
    pub odds: MarketOdds,
}

impl MatchRecord {
    pub fn outcome(&self) -> Outcome {
        calibration::classify_outcome(self.home_goals, self.away_goals)
    }

    pub fn involves(&self, team: &str) -> bool {
        self.home == team || self.away == team
    }
}

struct Columns {
    date: usize,
    home: usize,
    away: usize,
    home_goals: usize,
    away_goals: usize,
    odds_home: Vec<usize>,
    odds_draw: Vec<usize>,
    odds_away: Vec<usize>,
}

impl Columns {
    fn resolve(headers: &csv::ByteRecord, path: &Path) -> Result<Self, ImportError> {
        let names: Vec<String> = decode_cells(headers)
            .into_iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let find = |name: &str| names.iter().position(|h| h == name);
        let require = |column: &'static str| {
            find(column).ok_or_else(|| ImportError::MissingColumn {
                path: path.to_path_buf(),
                column,
            })
        };
        let optional = |cols: &[&str]| cols.iter().filter_map(|c| find(c)).collect::<Vec<_>>();

        Ok(Self {
            date: require(COL_DATE)?,
            home: require(COL_HOME)?,
            away: require(COL_AWAY)?,
            home_goals: require(COL_HOME_GOALS)?,
            away_goals: require(COL_AWAY_GOALS)?,
            odds_home: optional(&ODDS_HOME_COLS),
            odds_draw: optional(&ODDS_DRAW_COLS),
            odds_away: optional(&ODDS_AWAY_COLS),
        })
    }
}

/// Parses a football-data.co.uk style results file.
///
/// Rows without both team names or without both full-time goal cells are dropped.
/// Cells are decoded lossily, so a Latin-1 team name survives with a replacement char.
/// A goal or date cell that is present but unparsable aborts the import: a silently
/// missing row would shift every later team state in the rolling backtest.
pub fn parse_football_data_csv<R: Read>(
    reader: R,
    path: &Path,
    league: &str,
    season: &str,
) -> Result<Vec<MatchRecord>, ImportError> {
    let csv_err = |source| ImportError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.byte_headers().map_err(csv_err)?.clone();
    let cols = Columns::resolve(&headers, path)?;

    let mut out = Vec::new();
    for row in reader.byte_records() {
        let row = row.map_err(csv_err)?;
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        let cells = decode_cells(&row);
        let cell = |idx: usize| cells.get(idx).map(|c| c.trim()).unwrap_or("");

        let home = cell(cols.home);
        let away = cell(cols.away);
        if home.is_empty() || away.is_empty() {
            continue;
        }
        let (raw_hg, raw_ag) = (cell(cols.home_goals), cell(cols.away_goals));
        if raw_hg.is_empty() || raw_ag.is_empty() {
            continue;
        }

        let home_goals = parse_goals(raw_hg, path, line)?;
        let away_goals = parse_goals(raw_ag, path, line)?;
        let raw_date = cell(cols.date);
        let date = parse_match_date(raw_date).ok_or_else(|| ImportError::InvalidDate {
            path: path.to_path_buf(),
            line,
            value: raw_date.to_string(),
        })?;

        let price = |idxs: &[usize]| idxs.iter().find_map(|i| parse_price(cell(*i)));
        out.push(MatchRecord {
            league: league.to_string(),
            season: season.to_string(),
            date,
            home: home.to_string(),
            away: away.to_string(),
            home_goals,
            away_goals,
            odds: MarketOdds {
                home: price(&cols.odds_home),
                draw: price(&cols.odds_draw),
                away: price(&cols.odds_away),
            },
        });
    }
    Ok(out)
}

pub fn import_football_data_csv(
    path: &Path,
    league: &str,
    season: &str,
) -> Result<Vec<MatchRecord>, ImportError> {
    let file = fs::File::open(path).map_err(|source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_football_data_csv(file, path, league, season)
}

/// Loads every `*.csv` season file in one league folder, in file-name order.
pub fn import_league_folder(folder: &Path, league: &str) -> Result<Vec<MatchRecord>, ImportError> {
    let mut files = list_dir(folder)?
        .into_iter()
        .filter(|p| p.is_file())
        .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("csv")))
        .collect::<Vec<_>>();
    files.sort();

    let mut all = Vec::new();
    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let season = season_from_file_name(&name);
        let rows = import_football_data_csv(&file, league, &season)?;
        debug!(league, season = %season, rows = rows.len(), "imported season file");
        all.extend(rows);
    }
    Ok(all)
}

/// Loads an archive laid out as `<root>/<league id>/<season>.csv`, then orders it by date.
pub fn import_archive_root(root: &Path) -> Result<Vec<MatchRecord>, ImportError> {
    let mut leagues = list_dir(root)?
        .into_iter()
        .filter(|p| p.is_dir())
        .collect::<Vec<_>>();
    leagues.sort();

    let mut all = Vec::new();
    for dir in &leagues {
        let Some(league) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        all.extend(import_league_folder(dir, &league)?);
    }
    sort_chronologically(&mut all);
    info!(
        leagues = leagues.len(),
        matches = all.len(),
        root = %root.display(),
        "archive loaded"
    );
    Ok(all)
}

/// Stable date sort: same-day fixtures keep their archive order.
pub fn sort_chronologically(matches: &mut [MatchRecord]) {
    matches.sort_by_key(|m| m.date);
}

pub fn league_ids(matches: &[MatchRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for m in matches {
        if seen.insert(m.league.as_str()) {
            out.push(m.league.clone());
        }
    }
    out
}

pub fn filter_league(matches: &[MatchRecord], league: &str) -> Vec<MatchRecord> {
    matches
        .iter()
        .filter(|m| m.league == league)
        .cloned()
        .collect()
}

/// First run of four digits in the file name (`E0_1415.csv` -> `1415`).
pub fn season_from_file_name(name: &str) -> String {
    let mut buf = String::new();
    for ch in name.chars() {
        if ch.is_ascii_digit() {
            buf.push(ch);
            if buf.len() == 4 {
                return buf;
            }
        } else {
            buf.clear();
        }
    }
    "unknown".to_string()
}

/// Accepts `DD/MM/YYYY` and `DD/MM/YY`; two-digit years above 50 are 19xx, the rest 20xx.
pub fn parse_match_date(raw: &str) -> Option<NaiveDate> {
    let mut parts = raw.trim().split('/');
    let day = parts.next()?.trim().parse::<u32>().ok()?;
    let month = parts.next()?.trim().parse::<u32>().ok()?;
    let year_raw = parts.next()?.trim();
    if parts.next().is_some() {
        return None;
    }
    let mut year = year_raw.parse::<i32>().ok()?;
    if year_raw.len() <= 2 {
        year += if year > 50 { 1900 } else { 2000 };
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

fn decode_cells(record: &csv::ByteRecord) -> Vec<String> {
    record
        .iter()
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect()
}

fn parse_goals(raw: &str, path: &Path, line: u64) -> Result<u8, ImportError> {
    raw.parse::<u8>().map_err(|_| ImportError::InvalidGoals {
        path: path.to_path_buf(),
        line,
        value: raw.to_string(),
    })
}

fn parse_price(raw: &str) -> Option<f64> {
    let v = raw.parse::<f64>().ok()?;
    (v.is_finite() && v > 0.0).then_some(v)
}

fn list_dir(dir: &Path) -> Result<Vec<PathBuf>, ImportError> {
    let io_err = |source| ImportError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        out.push(entry.map_err(io_err)?.path());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\u{feff}Div,Date,HomeTeam,AwayTeam,FTHG,FTAG,FTR,B365H,B365D,B365A,AvgH,AvgD,AvgA\n\
E0,13/08/2021,Brentford,Arsenal,2,0,H,4,3.4,1.95,3.9,3.35,2\n\
E0,14/08/21,Man United,Leeds,5,1,H,,,,1.7,3.9,4.8\n\
E0,14/08/2021,Burnley,,1,2,A,3.2,3.3,2.3,3.1,3.3,2.3\n\
E0,15/08/2021,Newcastle,West Ham,,,,2.8,3.4,2.5,2.8,3.4,2.5\n";

    #[test]
    fn parses_rows_and_falls_back_to_average_odds() {
        let rows =
            parse_football_data_csv(SAMPLE.as_bytes(), Path::new("E0_2122.csv"), "ENG1", "2122")
                .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].home, "Brentford");
        assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2021, 8, 13).unwrap());
        assert_eq!(rows[0].odds.home, Some(4.0));
        assert_eq!(rows[1].date, NaiveDate::from_ymd_opt(2021, 8, 14).unwrap());
        assert_eq!(rows[1].odds, MarketOdds::new(1.7, 3.9, 4.8));
        assert_eq!(rows[1].outcome(), Outcome::Home);
    }

    #[test]
    fn latin1_team_name_does_not_sink_the_file() {
        let mut raw = b"Div,Date,HomeTeam,AwayTeam,FTHG,FTAG\nSP1,19/08/2017,Legan".to_vec();
        raw.push(0xE9);
        raw.extend_from_slice(b"s,Alaves,1,0\nSP1,20/08/2017,Betis,Barcelona,0,2\n");
        let rows =
            parse_football_data_csv(raw.as_slice(), Path::new("SP1_1718.csv"), "ESP1", "1718")
                .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].home, "Legan\u{fffd}s");
        assert_eq!(rows[0].away, "Alaves");
        assert_eq!(rows[1].outcome(), Outcome::Away);
    }

    #[test]
    fn bad_goal_cell_is_fatal() {
        let raw = "Date,HomeTeam,AwayTeam,FTHG,FTAG\n01/09/2020,A,B,x,1\n";
        let err = parse_football_data_csv(raw.as_bytes(), Path::new("bad.csv"), "L", "2021")
            .unwrap_err();
        assert!(matches!(err, ImportError::InvalidGoals { .. }));
    }

    #[test]
    fn missing_column_is_reported() {
        let raw = "Date,HomeTeam,AwayTeam,FTHG\n";
        let err = parse_football_data_csv(raw.as_bytes(), Path::new("bad.csv"), "L", "2021")
            .unwrap_err();
        assert!(matches!(
            err,
            ImportError::MissingColumn {
                column: "FTAG",
                ..
            }
        ));
    }

    #[test]
    fn season_key_from_file_name() {
        assert_eq!(season_from_file_name("E0_1415.csv"), "1415");
        assert_eq!(season_from_file_name("E0.csv"), "unknown");
        assert_eq!(season_from_file_name("E0-20-21-2021.csv"), "2021");
    }

    #[test]
    fn date_parsing_variants() {
        assert_eq!(
            parse_match_date("05/01/19"),
            NaiveDate::from_ymd_opt(2019, 1, 5)
        );
        assert_eq!(
            parse_match_date("19/08/95"),
            NaiveDate::from_ymd_opt(1995, 8, 19)
        );
        assert_eq!(
            parse_match_date("19/08/50"),
            NaiveDate::from_ymd_opt(2050, 8, 19)
        );
        assert!(parse_match_date("2019-01-05").is_none());
        assert!(parse_match_date("31/02/2020").is_none());
    }
}
