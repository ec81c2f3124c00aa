//! End-to-end aggregation over parsed station listings

use stationmap_stations::{aggregate, parse_station_text, AggregateError, StationRecord, StationSet};

fn three_elements() -> StationSet {
    [
        StationRecord::new("IS301", 37.20, -116.05, "SN"),
        StationRecord::new("IS302", 37.21, -116.04, "SN"),
        StationRecord::new("IS401", 37.22, -116.03, "SN"),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_two_arrays_from_three_elements() {
    let groups = aggregate(&three_elements()).unwrap();
    assert_eq!(groups.len(), 2);

    let is3 = groups.get("IS3").expect("IS3 present");
    assert_eq!(is3.members, 2);
    assert!((is3.lat - 37.205).abs() < 1e-9);
    assert!((is3.lon - (-116.045)).abs() < 1e-9);
    assert_eq!(is3.label(), "3");

    let is4 = groups.get("IS4").expect("IS4 present");
    assert_eq!(is4.members, 1);
    assert_eq!(is4.lat, 37.22);
    assert_eq!(is4.lon, -116.03);
    assert_eq!(is4.label(), "4");
}

#[test]
fn test_every_station_lands_in_one_group() {
    let stations = three_elements();
    let groups = aggregate(&stations).unwrap();
    let total: usize = groups.iter().map(|g| g.members).sum();
    assert_eq!(total, stations.len());
}

#[test]
fn test_lat_lon_vectors_follow_identifier_order() {
    let groups = aggregate(&three_elements()).unwrap();
    assert_eq!(groups.lats().len(), 2);
    assert_eq!(groups.lons()[1], -116.03);
}

#[test]
fn test_parsed_listing_aggregates() {
    let body = "\
#Network | Station | Latitude | Longitude | Elevation | SiteName | StartTime | EndTime
SN|IS31|37.20|-116.06|1280|e1|2011-05-03T00:00:00|
SN|IS32|37.22|-116.04|1281|e2|2011-05-03T00:00:00|
SN|IS51|37.18|-116.07|1275|e1|2011-05-03T00:00:00|
";
    let stations = parse_station_text(body).unwrap();
    let groups = aggregate(&stations).unwrap();
    let ids: Vec<_> = groups.iter().map(|g| g.array_id.clone()).collect();
    assert_eq!(ids, vec!["IS3", "IS5"]);
}

#[test]
fn test_empty_listing_is_distinct_failure() {
    let stations = parse_station_text("#Network | Station\n").unwrap();
    assert_eq!(aggregate(&stations), Err(AggregateError::NoStations));
}

#[test]
fn test_co_located_elements_keep_exact_coordinate() {
    let mut records: Vec<StationRecord> = (1..=3)
        .map(|i| StationRecord::new(format!("IS3{}", i), 0.1, -116.05, "SN"))
        .collect();
    records.extend((1..=7).map(|i| StationRecord::new(format!("IS4{}", i), 37.22, -116.04, "SN")));
    let stations: StationSet = records.into_iter().collect();

    let groups = aggregate(&stations).unwrap();
    let is3 = groups.get("IS3").unwrap();
    assert_eq!(is3.members, 3);
    assert_eq!(is3.lat, 0.1);
    let is4 = groups.get("IS4").unwrap();
    assert_eq!(is4.members, 7);
    assert_eq!(is4.lon, -116.04);
}
