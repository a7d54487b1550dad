//! The flight-log target schema and its record kinds.
//!
//! Four tables: `people` and `vehicles` stand alone, `person_properties`
//! hangs licences and memberships off people, and `missions` references
//! vehicles (towing vehicle included), four crew columns in `people`, and
//! other missions through `launch` (the tow or winch launch a flight got).

use crate::column::{ColumnInfo, Reference};
use crate::index::{IndexInfo, SortOrder};
use crate::record::{EntityKind, PropertyTable};
use crate::schema::Schema;
use crate::table::TableInfo;

pub const PEOPLE: &str = "people";
pub const PERSON_PROPERTIES: &str = "person_properties";
pub const VEHICLES: &str = "vehicles";
pub const MISSIONS: &str = "missions";

/// Columns of `missions` that reference `people`.
pub const CREW_COLUMNS: &[&str] = &["pilot", "copilot", "passenger", "winch_operator"];

/// A person, identified by name plus a disambiguating counter.
pub static PERSON: EntityKind = EntityKind {
    table: PEOPLE,
    natural_key: &["last_name", "first_name", "count"],
    property_kinds: &["licence", "medical", "membership"],
    property_table: Some(PropertyTable {
        table: PERSON_PROPERTIES,
        owner_column: "person",
    }),
};

/// An aircraft or launch vehicle, identified by registration.
pub static VEHICLE: EntityKind = EntityKind {
    table: VEHICLES,
    natural_key: &["registration"],
    property_kinds: &[],
    property_table: None,
};

/// One flight, identified by date, vehicle and departure time.
pub static MISSION: EntityKind = EntityKind {
    table: MISSIONS,
    natural_key: &["date", "vehicle", "departure"],
    property_kinds: &[],
    property_table: None,
};

fn id_column() -> ColumnInfo {
    ColumnInfo::new("id", "INTEGER")
        .not_null()
        .with_extra("AUTOINCREMENT")
}

fn reference_to(name: &str, table: &str) -> ColumnInfo {
    ColumnInfo::new(name, "INTEGER").with_reference(Reference::new(table, "id"))
}

fn unique_index(name: &str, columns: &[&str]) -> IndexInfo {
    columns
        .iter()
        .fold(IndexInfo::builder(name).unique(true), |builder, column| {
            builder.add_column(*column, SortOrder::Asc, None)
        })
        .build()
        .expect("static index definitions are contiguous")
}

fn table(name: &str, columns: Vec<ColumnInfo>, indices: Vec<IndexInfo>) -> TableInfo {
    let mut table = TableInfo::with_columns(name, columns)
        .expect("static table definitions have unique column names");
    table.add_index(IndexInfo::id_index(format!("pk_{name}"), "id"));
    for index in indices {
        table.add_index(index);
    }
    table
}

/// Builds the flight-log schema.
pub fn schema() -> Schema {
    let people = table(
        PEOPLE,
        vec![
            id_column(),
            ColumnInfo::new("last_name", "TEXT").not_null(),
            ColumnInfo::new("first_name", "TEXT").not_null(),
            ColumnInfo::new("count", "INTEGER").not_null().with_default("0"),
            ColumnInfo::new("birthday", "DATE"),
            ColumnInfo::new("email", "TEXT").null_if_falsy(),
        ],
        vec![unique_index("people_name", &["last_name", "first_name", "count"])],
    );

    let person_properties = table(
        PERSON_PROPERTIES,
        vec![
            id_column(),
            reference_to("person", PEOPLE).not_null(),
            ColumnInfo::new("kind", "TEXT").not_null(),
            ColumnInfo::new("value", "TEXT"),
            ColumnInfo::new("valid_from", "DATETIME"),
            ColumnInfo::new("valid_until", "DATETIME"),
        ],
        vec![
            IndexInfo::builder("person_properties_owner")
                .add_column("person", SortOrder::Asc, None)
                .add_column("kind", SortOrder::Asc, None)
                .build()
                .expect("static index definitions are contiguous"),
        ],
    );

    let vehicles = table(
        VEHICLES,
        vec![
            id_column(),
            ColumnInfo::new("registration", "TEXT").not_null(),
            ColumnInfo::new("model", "TEXT"),
            ColumnInfo::new("seats", "INTEGER").with_default("1"),
        ],
        vec![unique_index("vehicles_registration", &["registration"])],
    );

    let mut mission_columns = vec![
        id_column(),
        ColumnInfo::new("date", "DATE").not_null(),
        reference_to("vehicle", VEHICLES).not_null(),
        ColumnInfo::new("departure", "DATETIME"),
        ColumnInfo::new("arrival", "DATETIME"),
    ];
    mission_columns.extend(CREW_COLUMNS.iter().map(|c| reference_to(c, PEOPLE)));
    mission_columns.extend([
        reference_to("launch", MISSIONS).null_if_falsy(),
        reference_to("launch_vehicle", VEHICLES),
        ColumnInfo::new("landings", "INTEGER").with_default("1"),
        ColumnInfo::new("remarks", "TEXT"),
    ]);
    let missions = table(
        MISSIONS,
        mission_columns,
        vec![unique_index("missions_slot", &["date", "vehicle", "departure"])],
    );

    [people, person_properties, vehicles, missions]
        .into_iter()
        .collect()
}
