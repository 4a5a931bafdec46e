//! Loading real files from disk and running a session on them

use std::path::PathBuf;

use polygon_checker::checks::Rule;
use polygon_checker::core::config::CheckConfig;
use polygon_checker::core::error::CheckError;
use polygon_checker::crs::Crs;
use polygon_checker::loader::DatasetLoader;
use polygon_checker::present::{export_geojson, MapView};
use polygon_checker::session::Session;

const PARCELS: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {
      "type": "Feature",
      "properties": { "name": "north" },
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[8.0, 9.0], [8.1, 9.0], [8.1, 9.1], [8.0, 9.1], [8.0, 9.0]]]
      }
    },
    {
      "type": "Feature",
      "properties": { "name": "south" },
      "geometry": {
        "type": "Polygon",
        "coordinates": [[[8.0, 8.9], [8.1, 8.9], [8.1, 9.0], [8.0, 9.0], [8.0, 8.9]]]
      }
    },
    {
      "type": "Feature",
      "properties": { "name": "unmapped" },
      "geometry": null
    }
  ]
}"#;

/// Scratch directory unique to one test
fn scratch(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("polycheck-{}-{}", test, std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write(dir: &PathBuf, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_same_file_twice_yields_duplicates() {
    let dir = scratch("twice");
    let path = write(&dir, "parcels.geojson", PARCELS.as_bytes());

    let session = Session::open(&[path.clone(), path], CheckConfig::default()).unwrap();
    assert_eq!(session.layers().len(), 2);
    assert_eq!(session.merged().len(), 4);

    let report = session.run(false);
    let duplicates = report.result(Rule::Duplicates).unwrap();
    let flagged: Vec<_> = duplicates.findings.iter().map(|f| f.features[0]).collect();
    assert_eq!(flagged, vec![2, 3]);

    // Within one copy the parcels only share an edge
    let first = &session.layers()[0];
    let single = Session::new(vec![first.clone()], CheckConfig::default()).run(false);
    assert!(single.result(Rule::Overlaps).unwrap().passed());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_rows_without_geometry_keep_provenance_of_the_rest() {
    let dir = scratch("provenance");
    let path = write(&dir, "parcels.geojson", PARCELS.as_bytes());

    let layer = DatasetLoader::new(Crs::Wgs84).load_path(&path).unwrap();
    assert_eq!(layer.len(), 2);
    assert_eq!(layer.features[1].provenance.row, 1);
    assert_eq!(layer.features[1].attributes["name"], "south");

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_reprojected_load_round_trips_through_export() {
    let dir = scratch("mercator");
    let path = write(&dir, "parcels.geojson", PARCELS.as_bytes());

    let layer = DatasetLoader::new(Crs::WebMercator).load_path(&path).unwrap();
    assert_eq!(layer.crs, Crs::WebMercator);
    let corner = layer.features[0].geometry.0[0].exterior().0[1];
    assert!(corner.x > 900_000.0);

    let exported = export_geojson(&layer).unwrap().parse::<geojson::GeoJson>().unwrap();
    let exported = geojson::FeatureCollection::try_from(exported).unwrap();
    let geometry = exported.features[0].geometry.clone().unwrap();
    let back = geo_types::MultiPolygon::<f64>::try_from(geometry.value).unwrap();
    let corner = back.0[0].exterior().0[1];
    assert!((corner.x - 8.1).abs() < 1e-9);
    assert!((corner.y - 9.0).abs() < 1e-9);

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_kml_and_geojson_together() {
    let dir = scratch("kml");
    let geojson = write(&dir, "parcels.geojson", PARCELS.as_bytes());
    let kml = write(
        &dir,
        "field.kml",
        br#"<?xml version="1.0" encoding="UTF-8"?>
<kml xmlns="http://www.opengis.net/kml/2.2">
  <Document>
  <Placemark>
    <name>overlapping field</name>
    <Polygon>
      <outerBoundaryIs>
        <LinearRing>
          <coordinates>8.05,8.95 8.15,8.95 8.15,9.05 8.05,9.05 8.05,8.95</coordinates>
        </LinearRing>
      </outerBoundaryIs>
    </Polygon>
  </Placemark>
  </Document>
</kml>"#,
    );

    let session = Session::open(&[geojson, kml], CheckConfig::default()).unwrap();
    let report = session.run(true);

    let cross = report.result(Rule::CrossOverlaps).unwrap();
    assert_eq!(cross.layer, "parcels.geojson x field.kml");
    assert_eq!(cross.findings.len(), 2);
    assert!(!report.result(Rule::Overlaps).unwrap().passed());

    let map = MapView::from_report(&report, session.merged(), &session.config().map);
    assert!(map.layer("Cross-layer Overlaps (parcels.geojson x field.kml)").is_some());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_geopackage_file() {
    let dir = scratch("gpkg");
    let path = dir.join("plots.gpkg");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(
            "CREATE TABLE gpkg_spatial_ref_sys (
                srs_name TEXT NOT NULL, srs_id INTEGER PRIMARY KEY,
                organization TEXT NOT NULL, organization_coordsys_id INTEGER NOT NULL,
                definition TEXT NOT NULL, description TEXT);
             INSERT INTO gpkg_spatial_ref_sys VALUES
                ('WGS 84', 4326, 'EPSG', 4326, 'GEOGCS[\"WGS 84\"]', NULL);
             CREATE TABLE gpkg_contents (
                table_name TEXT PRIMARY KEY, data_type TEXT NOT NULL, identifier TEXT);
             INSERT INTO gpkg_contents VALUES ('plots', 'features', 'plots');
             CREATE TABLE gpkg_geometry_columns (
                table_name TEXT NOT NULL, column_name TEXT NOT NULL,
                geometry_type_name TEXT NOT NULL, srs_id INTEGER NOT NULL,
                z TINYINT NOT NULL, m TINYINT NOT NULL);
             INSERT INTO gpkg_geometry_columns VALUES ('plots', 'geom', 'POLYGON', 4326, 0, 0);
             CREATE TABLE plots (fid INTEGER PRIMARY KEY, geom BLOB, owner TEXT);",
        )
        .unwrap();

        let bowtie = [(0.0, 0.0), (2.0, 2.0), (2.0, 0.0), (0.0, 2.0), (0.0, 0.0)];
        let square = [(5.0, 5.0), (6.0, 5.0), (6.0, 6.0), (5.0, 6.0), (5.0, 5.0)];
        for (owner, ring) in [("ada", &bowtie), ("bo", &square)] {
            conn.execute(
                "INSERT INTO plots (geom, owner) VALUES (?1, ?2)",
                rusqlite::params![gpkg_polygon(4326, ring), owner],
            )
            .unwrap();
        }
    }

    let mut session = Session::open(&[path], CheckConfig::default()).unwrap();
    assert_eq!(session.merged().features[1].attributes["owner"], "bo");
    assert!(!session.run(false).result(Rule::Invalid).unwrap().passed());

    assert_eq!(session.fix(), 1);
    assert!(session.run(false).result(Rule::Invalid).unwrap().passed());

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_unsupported_extension() {
    let dir = scratch("unsupported");
    let path = write(&dir, "notes.txt", b"not geometry");

    let err = Session::open(&[path], CheckConfig::default()).unwrap_err();
    assert!(matches!(err, CheckError::UnsupportedFormat(_)));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn test_non_polygonal_input_is_rejected() {
    let dir = scratch("points");
    let path = write(
        &dir,
        "wells.geojson",
        br#"{"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [8.0, 9.0]}}"#,
    );

    let err = Session::open(&[path], CheckConfig::default()).unwrap_err();
    assert!(matches!(err, CheckError::NonPolygonal { row: 0, .. }));

    std::fs::remove_dir_all(&dir).unwrap();
}

/// GeoPackage blob: little-endian header without envelope, then WKB
fn gpkg_polygon(srs_id: i32, ring: &[(f64, f64)]) -> Vec<u8> {
    let mut blob = vec![b'G', b'P', 0, 0x01];
    blob.extend_from_slice(&srs_id.to_le_bytes());
    blob.push(1);
    blob.extend_from_slice(&3u32.to_le_bytes());
    blob.extend_from_slice(&1u32.to_le_bytes());
    blob.extend_from_slice(&(ring.len() as u32).to_le_bytes());
    for (x, y) in ring {
        blob.extend_from_slice(&x.to_le_bytes());
        blob.extend_from_slice(&y.to_le_bytes());
    }
    blob
}

/// Write a two-feature shapefile with shapefile's own writer and zip it
fn shapefile_zip(dir: &PathBuf) -> PathBuf {
    use shapefile::dbase::{FieldValue, Record, TableWriterBuilder};
    use shapefile::{Point, PolygonRing};
    use std::io::Write;

    let shp = dir.join("plots.shp");
    let table = TableWriterBuilder::new().add_character_field("name".try_into().unwrap(), 20);
    let mut writer = shapefile::Writer::from_path(&shp, table).unwrap();
    for (name, x) in [("east", 1.0), ("west", -2.0)] {
        let ring = vec![
            Point::new(x, 0.0),
            Point::new(x, 1.0),
            Point::new(x + 1.0, 1.0),
            Point::new(x + 1.0, 0.0),
        ];
        let mut record = Record::default();
        record.insert("name".to_string(), FieldValue::Character(Some(name.to_string())));
        writer
            .write_shape_and_record(&shapefile::Polygon::new(PolygonRing::Outer(ring)), &record)
            .unwrap();
    }
    drop(writer);
    write(dir, "plots.prj", br#"GEOGCS["GCS_WGS_1984",DATUM["D_WGS_1984",SPHEROID["WGS_1984",6378137.0,298.257223563]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#);

    let path = dir.join("plots.zip");
    let mut zip = zip::ZipWriter::new(std::fs::File::create(&path).unwrap());
    let options =
        zip::write::SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    for member in ["plots.shp", "plots.shx", "plots.dbf", "plots.prj"] {
        zip.start_file(member, options).unwrap();
        zip.write_all(&std::fs::read(dir.join(member)).unwrap()).unwrap();
    }
    zip.finish().unwrap();
    path
}

#[test]
fn test_zipped_shapefile() {
    use geo::Area;

    let dir = scratch("shapefile");
    let path = shapefile_zip(&dir);

    let layer = DatasetLoader::new(Crs::Wgs84).load_path(&path).unwrap();
    assert_eq!(layer.name, "plots.zip");
    assert_eq!(layer.crs, Crs::Wgs84);
    assert_eq!(layer.len(), 2);

    let names: Vec<_> = layer.features.iter().map(|f| f.attributes["name"].clone()).collect();
    assert_eq!(names, vec!["east", "west"]);
    for feature in &layer.features {
        assert_eq!(feature.geometry.0.len(), 1);
        assert!((feature.geometry.unsigned_area() - 1.0).abs() < 1e-12);
    }
    let corner = layer.features[1].bounding_rect().unwrap().min();
    assert_eq!((corner.x, corner.y), (-2.0, 0.0));

    let report = Session::new(vec![layer], CheckConfig::default()).run(false);
    for rule in [Rule::Invalid, Rule::Duplicates, Rule::Overlaps] {
        assert!(report.result(rule).unwrap().passed());
    }
    // The strip between the squares is the only gap
    let gaps = report.result(Rule::Gaps).unwrap();
    assert_eq!(gaps.findings.len(), 1);

    std::fs::remove_dir_all(&dir).unwrap();
}
