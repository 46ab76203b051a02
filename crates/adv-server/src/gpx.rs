//! Serialization of planned coordinates into GPX and GeoJSON documents.

use adv_core::models::Point;
use serde_json::{json, Value};

/// Render a GPX 1.1 document with the plan as a single track segment.
pub fn to_gpx(name: &str, points: &[Point]) -> String {
    let mut doc = String::with_capacity(256 + points.len() * 64);
    doc.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    doc.push_str(
        "<gpx version=\"1.1\" creator=\"adv-server\" xmlns=\"http://www.topografix.com/GPX/1/1\">\n",
    );
    doc.push_str("  <trk>\n");
    doc.push_str(&format!("    <name>{}</name>\n", escape_xml(name)));
    doc.push_str("    <trkseg>\n");
    for point in points {
        doc.push_str(&format!(
            "      <trkpt lat=\"{:.6}\" lon=\"{:.6}\"/>\n",
            point.lat, point.lon
        ));
    }
    doc.push_str("    </trkseg>\n  </trk>\n</gpx>\n");
    doc
}

/// Render the plan as a GeoJSON LineString feature.
pub fn to_geojson(points: &[Point]) -> Value {
    let coordinates: Vec<[f64; 2]> = points.iter().map(Point::lon_lat).collect();
    json!({
        "type": "Feature",
        "geometry": {
            "type": "LineString",
            "coordinates": coordinates,
        },
        "properties": {},
    })
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> Vec<Point> {
        vec![
            Point { lat: 46.0, lon: 7.0 },
            Point {
                lat: 46.1,
                lon: 7.05,
            },
        ]
    }

    #[test]
    fn gpx_document_holds_every_point() {
        let doc = to_gpx("ride & back", &points());
        assert!(doc.starts_with("<?xml"));
        assert!(doc.contains("<name>ride &amp; back</name>"));
        assert_eq!(doc.matches("<trkpt").count(), 2);
        assert!(doc.contains("lat=\"46.000000\" lon=\"7.000000\""));
        assert!(doc.trim_end().ends_with("</gpx>"));
    }

    #[test]
    fn geojson_uses_lon_lat_order() {
        let value = to_geojson(&points());
        assert_eq!(value["geometry"]["type"], "LineString");
        assert_eq!(value["geometry"]["coordinates"][0][0], 7.0);
        assert_eq!(value["geometry"]["coordinates"][0][1], 46.0);
    }
}
