//! Great-circle distance and geohash encoding.

const EARTH_RADIUS_M: f64 = 6_371_000.0;
const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Haversine distance in metres between two WGS84 points.
pub fn haversine_m(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());
    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Encode a point as a geohash of `precision` characters (clamped to 1..=12).
pub fn encode(lat: f64, lon: f64, precision: usize) -> String {
    let precision = precision.clamp(1, 12);
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut bits = 0u8;
    let mut bit_count = 0;
    let mut even = true;

    while hash.len() < precision {
        if even {
            let mid = (lon_range.0 + lon_range.1) / 2.0;
            if lon >= mid {
                bits = (bits << 1) | 1;
                lon_range.0 = mid;
            } else {
                bits <<= 1;
                lon_range.1 = mid;
            }
        } else {
            let mid = (lat_range.0 + lat_range.1) / 2.0;
            if lat >= mid {
                bits = (bits << 1) | 1;
                lat_range.0 = mid;
            } else {
                bits <<= 1;
                lat_range.1 = mid;
            }
        }
        even = !even;
        bit_count += 1;
        if bit_count == 5 {
            hash.push(BASE32[bits as usize] as char);
            bits = 0;
            bit_count = 0;
        }
    }
    hash
}

/// Whether two geohashes agree on their first `precision` characters.
///
/// Hashes shorter than `precision` never match: a coarse cell says nothing
/// about whether two listings share a building.
pub fn same_cell(a: &str, b: &str, precision: usize) -> bool {
    let prefix = |hash: &str| -> Option<Vec<char>> {
        let cell: Vec<char> = hash
            .trim()
            .chars()
            .take(precision)
            .map(|c| c.to_ascii_lowercase())
            .collect();
        (cell.len() == precision).then_some(cell)
    };
    match (prefix(a), prefix(b)) {
        (Some(a), Some(b)) => precision > 0 && a == b,
        _ => false,
    }
}

/// Whether `hash` is a non-empty geohash in the base32 alphabet (any case).
pub fn is_valid(hash: &str) -> bool {
    !hash.is_empty()
        && hash
            .bytes()
            .all(|b| BASE32.contains(&b.to_ascii_lowercase()))
}
