#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

pub const ESRI_ASCII_GRID: &str = "ncols 4\nnrows 3\nxllcorner 0\nyllcorner 0\ncellsize 10\n\
NODATA_value -9999\n1 2 3 4\n5 -9999 7 8\n9 10 11 12\n";

pub const PGM_GRID: &str = "P2\n# a graymap\n3 2\n255\n0 10 20\n30 40 255\n";

pub const BIL_HEADER: &str = "nrows 2\nncols 2\nnbits 16\nbyteorder M\nlayout bil\n";

/// Writes `contents` to `dir/name`
pub fn fixture(dir: &Path, name: &str, contents: impl AsRef<[u8]>) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, contents)?;
    Ok(path)
}

/// Big-endian 16 bit samples
pub fn be_i16(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// A point shapefile with the given points and a bogus header box
pub fn point_shapefile(points: &[(f64, f64)]) -> Vec<u8> {
    let records: Vec<Vec<u8>> = points
        .iter()
        .map(|(x, y)| {
            let mut r = 1i32.to_le_bytes().to_vec();
            r.extend(x.to_le_bytes());
            r.extend(y.to_le_bytes());
            r
        })
        .collect();
    let body_len: usize = records.iter().map(|r| r.len() + 8).sum();
    let mut data = Vec::new();
    data.extend(9994i32.to_be_bytes());
    data.extend([0u8; 20]);
    data.extend(i32::try_from((100 + body_len) / 2).unwrap().to_be_bytes());
    data.extend(1000i32.to_le_bytes());
    data.extend(1i32.to_le_bytes());
    for v in [0.0f64, 0.0, 0.0, 0.0] {
        data.extend(v.to_le_bytes());
    }
    data.extend([0u8; 32]);
    for (i, record) in records.iter().enumerate() {
        data.extend(i32::try_from(i + 1).unwrap().to_be_bytes());
        data.extend(i32::try_from(record.len() / 2).unwrap().to_be_bytes());
        data.extend(record);
    }
    data
}
