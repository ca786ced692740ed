use std::path::Path;

use chrono::NaiveTime;
use log::info;
use num_traits::FromPrimitive;
use serde::Serialize;
use sqlite::OpenFlags;

use crate::{
    batch::BatchOutcome,
    error::{ExportError, ImportError},
    grouping::{Group, GroupId},
    network::RoadNetwork,
    timeline::TimedLeg,
    trip::{format_clock, parse_clock_time, Day, Direction, Stratum},
};

fn ensure_absent(out_filename: &str) -> Result<(), ExportError> {
    if Path::new(out_filename).exists() {
        return Err(ExportError::OutputExists(out_filename.into()));
    }
    Ok(())
}

/// Writes groups, routes, legs, exclusions and stats into a new SQLite file.
pub fn export_outcome(
    outcome: &BatchOutcome,
    network: &RoadNetwork,
    out_filename: &str,
) -> Result<(), ExportError> {
    ensure_absent(out_filename)?;
    info!("Exporting results to {}...", out_filename);
    let connection = sqlite::Connection::open_with_flags(
        out_filename,
        OpenFlags::default()
            .with_create()
            .with_no_mutex()
            .with_read_write(),
    )?;
    write_outcome(&connection, outcome, network)?;
    Ok(())
}

pub fn write_outcome(
    connection: &sqlite::Connection,
    outcome: &BatchOutcome,
    network: &RoadNetwork,
) -> Result<(), sqlite::Error> {
    connection.execute("BEGIN TRANSACTION;")?;

    connection.execute(
        "CREATE TABLE group_member (
            group_id TEXT NOT NULL,
            group_seq INTEGER NOT NULL,
            day INTEGER NOT NULL,
            direction INTEGER NOT NULL,
            rider_id INTEGER NOT NULL,
            category TEXT NOT NULL,
            departure TEXT NOT NULL
        );",
    )?;
    let mut stmt = connection.prepare(
        "INSERT INTO group_member (group_id, group_seq, day, direction, rider_id, category, departure) \
        VALUES (?, ?, ?, ?, ?, ?, ?)",
    )?;
    for group in &outcome.groups {
        for member in &group.members {
            stmt.bind((1, group.id.to_string().as_str()))?;
            stmt.bind((2, group.id.seq as i64))?;
            stmt.bind((3, group.id.stratum.day as i64))?;
            stmt.bind((4, group.id.stratum.direction as i64))?;
            stmt.bind((5, member.rider_id as i64))?;
            stmt.bind((6, &*member.category))?;
            stmt.bind((7, member.departure.format("%H:%M").to_string().as_str()))?;
            stmt.next()?;
            stmt.reset()?;
        }
    }

    connection.execute(
        "CREATE TABLE route_stop (
            group_id TEXT NOT NULL,
            stop_index INTEGER NOT NULL,
            node INTEGER NOT NULL
        );",
    )?;
    let mut stmt = connection
        .prepare("INSERT INTO route_stop (group_id, stop_index, node) VALUES (?, ?, ?)")?;
    for route in &outcome.routes {
        let group_id = route.group.to_string();
        for (stop_index, &node) in route.order.iter().enumerate() {
            stmt.bind((1, group_id.as_str()))?;
            stmt.bind((2, stop_index as i64))?;
            stmt.bind((3, network.ext_id(node).0 as i64))?;
            stmt.next()?;
            stmt.reset()?;
        }
    }

    connection.execute(
        "CREATE TABLE leg (
            group_id TEXT NOT NULL,
            leg_index INTEGER NOT NULL,
            from_node INTEGER NOT NULL,
            to_node INTEGER NOT NULL,
            distance_m REAL NOT NULL,
            travel_time_min REAL NOT NULL,
            arrival_time REAL NOT NULL,
            from_in_optimal_order INTEGER NOT NULL,
            to_in_optimal_order INTEGER NOT NULL
        );",
    )?;
    let mut stmt = connection.prepare(
        "INSERT INTO leg (group_id, leg_index, from_node, to_node, distance_m, travel_time_min, \
        arrival_time, from_in_optimal_order, to_in_optimal_order) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )?;
    let mut current_group: Option<GroupId> = None;
    let mut leg_index = 0;
    for leg in &outcome.legs {
        if current_group != Some(leg.group) {
            current_group = Some(leg.group);
            leg_index = 0;
        }
        stmt.bind((1, leg.group.to_string().as_str()))?;
        stmt.bind((2, leg_index as i64))?;
        stmt.bind((3, network.ext_id(leg.from).0 as i64))?;
        stmt.bind((4, network.ext_id(leg.to).0 as i64))?;
        stmt.bind((5, leg.distance))?;
        stmt.bind((6, leg.travel_time))?;
        stmt.bind((7, leg.arrival))?;
        stmt.bind((8, leg.from_is_stop as i64))?;
        stmt.bind((9, leg.to_is_stop as i64))?;
        stmt.next()?;
        stmt.reset()?;
        leg_index += 1;
    }

    connection.execute(
        "CREATE TABLE exclusion (
            subject TEXT NOT NULL,
            reason TEXT NOT NULL
        );",
    )?;
    let mut stmt = connection.prepare("INSERT INTO exclusion (subject, reason) VALUES (?, ?)")?;
    for exclusion in &outcome.exclusions {
        stmt.bind((1, exclusion.subject().as_str()))?;
        stmt.bind((2, exclusion.reason().as_str()))?;
        stmt.next()?;
        stmt.reset()?;
    }

    connection.execute(
        "CREATE TABLE run_stats (
            key TEXT PRIMARY KEY NOT NULL,
            value REAL NOT NULL
        );",
    )?;
    let mut stmt = connection.prepare("INSERT INTO run_stats (key, value) VALUES (?, ?)")?;
    for (key, value) in outcome.stats.rows() {
        stmt.bind((1, key))?;
        stmt.bind((2, value))?;
        stmt.next()?;
        stmt.reset()?;
    }

    connection.execute("END TRANSACTION;")?;
    Ok(())
}

/// A row of the `group_member` table.
#[derive(Debug, Clone, PartialEq)]
pub struct MemberRecord {
    pub group: GroupId,
    pub rider_id: u64,
    pub category: Box<str>,
    pub departure: NaiveTime,
}

pub fn import_members(connection: &sqlite::Connection) -> Result<Vec<MemberRecord>, ImportError> {
    connection
        .prepare(
            "SELECT group_seq, day, direction, rider_id, category, departure FROM group_member \
            ORDER BY rowid ASC;",
        )?
        .iter()
        .map(|it| -> Result<MemberRecord, ImportError> {
            let it = it?;
            let seq: i64 = it.read(0);
            let day: i64 = it.read(1);
            let direction: i64 = it.read(2);
            let rider_id: i64 = it.read(3);
            let departure: &str = it.read(5);
            let day = Day::from_i64(day).ok_or(ImportError::InvalidValue { column: "day", value: day })?;
            let direction = Direction::from_i64(direction).ok_or(ImportError::InvalidValue {
                column: "direction",
                value: direction,
            })?;
            Ok(MemberRecord {
                group: GroupId {
                    stratum: Stratum { day, direction },
                    seq: u32::try_from(seq).map_err(|_| ImportError::InvalidValue {
                        column: "group_seq",
                        value: seq,
                    })?,
                },
                rider_id: u64::try_from(rider_id).map_err(|_| ImportError::InvalidValue {
                    column: "rider_id",
                    value: rider_id,
                })?,
                category: it.read::<&str, _>(4).into(),
                departure: parse_clock_time(departure).ok_or_else(|| ImportError::InvalidText {
                    column: "departure",
                    value: departure.into(),
                })?,
            })
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct LegRow {
    group_id: String,
    from_node: u64,
    to_node: u64,
    distance_m: f64,
    travel_time_min: f64,
    arrival_time: String,
    from_in_optimal_order: bool,
    to_in_optimal_order: bool,
}

pub fn write_legs_csv(
    legs: &[TimedLeg],
    network: &RoadNetwork,
    stream: impl std::io::Write,
) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(stream);
    for leg in legs {
        writer.serialize(LegRow {
            group_id: leg.group.to_string(),
            from_node: network.ext_id(leg.from).0,
            to_node: network.ext_id(leg.to).0,
            distance_m: leg.distance,
            travel_time_min: leg.travel_time,
            arrival_time: format_clock(leg.arrival),
            from_in_optimal_order: leg.from_is_stop,
            to_in_optimal_order: leg.to_is_stop,
        })?;
    }
    writer.flush()?;
    Ok(())
}

pub fn export_legs_csv(
    legs: &[TimedLeg],
    network: &RoadNetwork,
    out_filename: &str,
) -> Result<(), ExportError> {
    ensure_absent(out_filename)?;
    write_legs_csv(legs, network, std::fs::File::create(out_filename)?)?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct MemberRow<'a> {
    group_id: String,
    rider_id: u64,
    category: &'a str,
    day: &'static str,
    direction: &'static str,
    departure_time: String,
}

pub fn write_members_csv(groups: &[Group], stream: impl std::io::Write) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(stream);
    for group in groups {
        for member in &group.members {
            writer.serialize(MemberRow {
                group_id: group.id.to_string(),
                rider_id: member.rider_id,
                category: &member.category,
                day: member.day.code(),
                direction: member.direction.code(),
                departure_time: member.departure.format("%H:%M").to_string(),
            })?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn export_members_csv(groups: &[Group], out_filename: &str) -> Result<(), ExportError> {
    ensure_absent(out_filename)?;
    info!("Writing group membership to {}...", out_filename);
    write_members_csv(groups, std::fs::File::create(out_filename)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        batch::RunContext,
        col::set_new,
        config::PoolConfig,
        test::sample::{sample_locations, sample_network, sample_trips},
    };

    fn sample_outcome(network: &RoadNetwork) -> BatchOutcome {
        let locations = sample_locations(network);
        let config = PoolConfig::default();
        let context = RunContext::new(network, &locations, &config, set_new()).unwrap();
        context.run(&sample_trips(), 7)
    }

    #[test]
    fn test_members_roundtrip_through_sqlite() {
        let network = sample_network();
        let outcome = sample_outcome(&network);
        let connection = sqlite::open(":memory:").unwrap();
        write_outcome(&connection, &outcome, &network).unwrap();

        let members = import_members(&connection).unwrap();
        let expected = outcome
            .groups
            .iter()
            .flat_map(|group| {
                group.members.iter().map(|member| MemberRecord {
                    group: group.id,
                    rider_id: member.rider_id,
                    category: member.category.clone(),
                    departure: member.departure,
                })
            })
            .collect::<Vec<_>>();
        assert_eq!(members, expected);

        let mut stmt = connection.prepare("SELECT COUNT(*) FROM leg").unwrap();
        assert_eq!(stmt.next().unwrap(), sqlite::State::Row);
        assert_eq!(stmt.read::<i64, _>(0).unwrap(), outcome.legs.len() as i64);

        let mut stmt = connection
            .prepare("SELECT value FROM run_stats WHERE key = 'num_groups'")
            .unwrap();
        assert_eq!(stmt.next().unwrap(), sqlite::State::Row);
        assert_eq!(
            stmt.read::<f64, _>(0).unwrap(),
            outcome.groups.len() as f64
        );
    }

    #[test]
    fn test_import_members_rejects_unknown_day() {
        let connection = sqlite::open(":memory:").unwrap();
        connection
            .execute(
                "CREATE TABLE group_member (group_id TEXT, group_seq INTEGER, day INTEGER, \
                direction INTEGER, rider_id INTEGER, category TEXT, departure TEXT);
                INSERT INTO group_member VALUES ('X', 1, 9, 0, 1, 'Students', '07:00');",
            )
            .unwrap();
        assert!(matches!(
            import_members(&connection),
            Err(ImportError::InvalidValue { column: "day", value: 9 })
        ));
    }

    #[test]
    fn test_import_members_rejects_bad_departure() {
        let connection = sqlite::open(":memory:").unwrap();
        connection
            .execute(
                "CREATE TABLE group_member (group_id TEXT, group_seq INTEGER, day INTEGER, \
                direction INTEGER, rider_id INTEGER, category TEXT, departure TEXT);
                INSERT INTO group_member VALUES ('M-out-1', 1, 0, 0, 1, 'Students', 'garbage');",
            )
            .unwrap();
        match import_members(&connection) {
            Err(ImportError::InvalidText { column, value }) => {
                assert_eq!(column, "departure");
                assert_eq!(&*value, "garbage");
            }
            other => panic!("expected a departure error, got {:?}", other),
        }
    }

    #[test]
    fn test_legs_csv_formats_arrival_as_clock() {
        let network = sample_network();
        let outcome = sample_outcome(&network);
        let mut buffer = Vec::new();
        write_legs_csv(&outcome.legs, &network, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("group_id,from_node,to_node,distance_m,travel_time_min,arrival_time,from_in_optimal_order,to_in_optimal_order")
        );
        let first = lines.next().unwrap();
        assert!(first.starts_with("M-out-1,"));
        let arrival = first.split(',').nth(5).unwrap();
        assert!(parse_clock_time(arrival).is_some());
        assert_eq!(text.lines().count(), outcome.legs.len() + 1);
    }

    #[test]
    fn test_members_csv() {
        let network = sample_network();
        let outcome = sample_outcome(&network);
        let mut buffer = Vec::new();
        write_members_csv(&outcome.groups, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("group_id,rider_id,category,day,direction,departure_time\n"));
        assert!(text.contains("M-out-1,1,Students,M,out,07:00\n"));
        assert!(text.contains("M-ret-1,9,Students,M,ret,15:00\n"));
    }
}
