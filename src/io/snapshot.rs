//! Equatorial temperature snapshots.
//!
//! [`PngSnapshotWriter`] renders an [`EquatorialSlice`] as a polar image:
//! longitude runs counter-clockwise from the +x axis, radius outward from the
//! centre, with colour limits at the slice's min and max. Pixels outside the
//! shell are white.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error type for snapshot output.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("slice has {found} values, expected {expected}")]
    SizeMismatch { expected: usize, found: usize },

    #[error("slice is empty")]
    Empty,
}

/// Temperature on the equatorial plane, gathered over all longitudes.
#[derive(Clone, Debug, PartialEq)]
pub struct EquatorialSlice {
    pub time: f64,
    /// Longitudes, ascending in [0, 2π)
    pub phi: Vec<f64>,
    /// Radii, in grid order
    pub radii: Vec<f64>,
    /// Values in (φ, r) order
    pub values: Vec<f64>,
}

impl EquatorialSlice {
    pub fn new(
        time: f64,
        phi: Vec<f64>,
        radii: Vec<f64>,
        values: Vec<f64>,
    ) -> Result<Self, SnapshotError> {
        let expected = phi.len() * radii.len();
        if expected == 0 {
            return Err(SnapshotError::Empty);
        }
        if values.len() != expected {
            return Err(SnapshotError::SizeMismatch {
                expected,
                found: values.len(),
            });
        }
        Ok(Self {
            time,
            phi,
            radii,
            values,
        })
    }

    /// Subtract the mean over longitude at every radius.
    pub fn remove_zonal_mean(&mut self) {
        let nr = self.radii.len();
        let nphi = self.phi.len() as f64;
        for k in 0..nr {
            let mean = self.values.iter().skip(k).step_by(nr).sum::<f64>() / nphi;
            self.values
                .iter_mut()
                .skip(k)
                .step_by(nr)
                .for_each(|v| *v -= mean);
        }
    }

    /// (min, max) of the finite values, or `None` if there are none.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    fn value(&self, i: usize, k: usize) -> f64 {
        self.values[i * self.radii.len() + k]
    }
}

/// Destination for numbered snapshots.
pub trait SnapshotSink {
    /// Write snapshot `index`.
    fn write(&mut self, index: usize, slice: &EquatorialSlice) -> Result<(), SnapshotError>;
}

/// Diverging colour stops, blue to red through pale yellow.
const DIVERGING_STOPS: [(f64, f64, f64); 5] = [
    (49.0, 54.0, 149.0),   // deep blue    (0.00)
    (116.0, 173.0, 209.0), // light blue   (0.25)
    (255.0, 255.0, 191.0), // pale yellow  (0.50)
    (244.0, 109.0, 67.0),  // orange       (0.75)
    (165.0, 0.0, 38.0),    // deep red     (1.00)
];

/// Map [0, 1] to RGBA. NaN maps to grey.
pub fn diverging_rgba(t: f64) -> [u8; 4] {
    if t.is_nan() {
        return [128, 128, 128, 255];
    }
    let t = t.clamp(0.0, 1.0);
    let seg = t * 4.0;
    let i = (seg as usize).min(3);
    let s = seg - i as f64;

    let (r0, g0, b0) = DIVERGING_STOPS[i];
    let (r1, g1, b1) = DIVERGING_STOPS[i + 1];
    [
        (r0 + s * (r1 - r0)) as u8,
        (g0 + s * (g1 - g0)) as u8,
        (b0 + s * (b1 - b0)) as u8,
        255,
    ]
}

/// Writes `T_<nnnn>.png` polar images into a directory.
#[derive(Debug)]
pub struct PngSnapshotWriter {
    dir: PathBuf,
    size: usize,
    raw_buf: Vec<u8>,
    png_buf: Vec<u8>,
}

impl PngSnapshotWriter {
    /// Create `dir` and render `size × size` images.
    pub fn new(dir: &Path, size: usize) -> Result<Self, SnapshotError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            size: size.max(8),
            raw_buf: Vec::new(),
            png_buf: Vec::new(),
        })
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("T_{:04}.png", index))
    }

    /// RGBA pixels of the polar rendering, row-major from the top.
    pub fn render(&self, slice: &EquatorialSlice) -> Vec<u8> {
        let n = self.size;
        let mut rgba = vec![255u8; n * n * 4];
        let r_outer = slice.radii.iter().copied().fold(f64::MIN, f64::max);
        let r_inner = slice.radii.iter().copied().fold(f64::MAX, f64::min);
        let (lo, hi) = slice.range().unwrap_or((0.0, 1.0));
        let span = if hi > lo { hi - lo } else { 1.0 };
        let half = 0.5 * n as f64;

        for y in 0..n {
            for x in 0..n {
                let px = (x as f64 + 0.5 - half) / half * r_outer;
                let py = (half - y as f64 - 0.5) / half * r_outer;
                let rho = px.hypot(py);
                if rho < r_inner || rho > r_outer {
                    continue;
                }
                let angle = py.atan2(px).rem_euclid(std::f64::consts::TAU);
                let i = nearest(&slice.phi, angle, true);
                let k = nearest(&slice.radii, rho, false);
                let color = diverging_rgba((slice.value(i, k) - lo) / span);
                let p = (y * n + x) * 4;
                rgba[p..p + 4].copy_from_slice(&color);
            }
        }
        rgba
    }
}

impl SnapshotSink for PngSnapshotWriter {
    fn write(&mut self, index: usize, slice: &EquatorialSlice) -> Result<(), SnapshotError> {
        let rgba = self.render(slice);
        encode_png_stored(&rgba, self.size, self.size, &mut self.raw_buf, &mut self.png_buf);
        let path = self.frame_path(index);
        fs::write(&path, &self.png_buf)?;
        tracing::debug!(path = %path.display(), time = slice.time, "wrote snapshot");
        Ok(())
    }
}

/// Index of the grid value closest to `x`; periodic in 2π when `periodic`.
fn nearest(grid: &[f64], x: f64, periodic: bool) -> usize {
    let distance = |g: f64| {
        let d = (g - x).abs();
        if periodic {
            d.min(std::f64::consts::TAU - d)
        } else {
            d
        }
    };
    grid.iter()
        .enumerate()
        .min_by(|a, b| distance(*a.1).total_cmp(&distance(*b.1)))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

// --- PNG encoding: stored deflate blocks, no compression ---

const fn make_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            if c & 1 != 0 {
                c = 0xEDB88320 ^ (c >> 1);
            } else {
                c >>= 1;
            }
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

static CRC_TABLE: [u32; 256] = make_crc_table();

fn png_crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc = CRC_TABLE[((crc ^ byte as u32) & 0xFF) as usize] ^ (crc >> 8);
    }
    crc ^ 0xFFFF_FFFF
}

/// Adler-32 checksum of the zlib stream.
fn adler32(data: &[u8]) -> u32 {
    const MOD: u32 = 65521;
    const NMAX: usize = 5552;
    let mut a: u32 = 1;
    let mut b: u32 = 0;
    for chunk in data.chunks(NMAX) {
        for &byte in chunk {
            a += byte as u32;
            b += a;
        }
        a %= MOD;
        b %= MOD;
    }
    (b << 16) | a
}

/// Append a chunk: length, type, data, CRC over type and data.
fn write_png_chunk(buf: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    buf.extend_from_slice(&(data.len() as u32).to_be_bytes());
    let crc_start = buf.len();
    buf.extend_from_slice(chunk_type);
    buf.extend_from_slice(data);
    let crc = png_crc32(&buf[crc_start..]);
    buf.extend_from_slice(&crc.to_be_bytes());
}

/// Encode RGBA pixels as a PNG with stored (uncompressed) deflate blocks.
fn encode_png_stored(
    rgba: &[u8],
    width: usize,
    height: usize,
    raw_buf: &mut Vec<u8>,
    png_buf: &mut Vec<u8>,
) {
    let row_payload = width * 4;
    raw_buf.clear();
    raw_buf.reserve((1 + row_payload) * height);
    for y in 0..height {
        raw_buf.push(0); // filter: none
        let row_start = y * row_payload;
        raw_buf.extend_from_slice(&rgba[row_start..row_start + row_payload]);
    }

    let mut zlib = Vec::with_capacity(raw_buf.len() + raw_buf.len() / 65535 * 5 + 11);
    zlib.extend_from_slice(&[0x78, 0x01]);
    let mut blocks = raw_buf.chunks(65535).peekable();
    if blocks.peek().is_none() {
        zlib.extend_from_slice(&[0x01, 0x00, 0x00, 0xFF, 0xFF]);
    }
    while let Some(block) = blocks.next() {
        let last = blocks.peek().is_none();
        zlib.push(u8::from(last));
        zlib.extend_from_slice(&(block.len() as u16).to_le_bytes());
        zlib.extend_from_slice(&(!(block.len() as u16)).to_le_bytes());
        zlib.extend_from_slice(block);
    }
    zlib.extend_from_slice(&adler32(raw_buf).to_be_bytes());

    png_buf.clear();
    png_buf.extend_from_slice(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
    let mut ihdr = [0u8; 13];
    ihdr[0..4].copy_from_slice(&(width as u32).to_be_bytes());
    ihdr[4..8].copy_from_slice(&(height as u32).to_be_bytes());
    ihdr[8] = 8; // bit depth
    ihdr[9] = 6; // RGBA
    write_png_chunk(png_buf, b"IHDR", &ihdr);
    write_png_chunk(png_buf, b"IDAT", &zlib);
    write_png_chunk(png_buf, b"IEND", &[]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use tempfile::tempdir;

    fn slice() -> EquatorialSlice {
        let phi: Vec<f64> = (0..8).map(|i| i as f64 * PI / 4.0).collect();
        let radii = vec![0.6, 1.0, 1.4];
        let values = phi
            .iter()
            .flat_map(|p| radii.iter().map(move |r| r + p.cos()))
            .collect();
        EquatorialSlice::new(0.5, phi, radii, values).unwrap()
    }

    #[test]
    fn test_slice_size_checked() {
        assert!(matches!(
            EquatorialSlice::new(0.0, vec![0.0, 1.0], vec![1.0], vec![0.0]),
            Err(SnapshotError::SizeMismatch { expected: 2, found: 1 })
        ));
        assert!(matches!(
            EquatorialSlice::new(0.0, vec![], vec![1.0], vec![]),
            Err(SnapshotError::Empty)
        ));
    }

    #[test]
    fn test_remove_zonal_mean() {
        let mut s = slice();
        s.remove_zonal_mean();
        for k in 0..3 {
            let mean: f64 = (0..8).map(|i| s.value(i, k)).sum::<f64>() / 8.0;
            assert!(mean.abs() < 1e-12);
        }
        // the cos φ part survives
        assert!((s.value(0, 1) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_colormap_endpoints() {
        assert_eq!(diverging_rgba(0.0), [49, 54, 149, 255]);
        assert_eq!(diverging_rgba(1.0), [165, 0, 38, 255]);
        assert_eq!(diverging_rgba(0.5), [255, 255, 191, 255]);
        assert_eq!(diverging_rgba(-3.0), diverging_rgba(0.0));
        assert_eq!(diverging_rgba(f64::NAN), [128, 128, 128, 255]);
    }

    #[test]
    fn test_render_masks_outside_shell() {
        let dir = tempdir().unwrap();
        let writer = PngSnapshotWriter::new(dir.path(), 32).unwrap();
        let rgba = writer.render(&slice());
        // centre lies inside the inner radius, corner outside the shell
        let centre = (16 * 32 + 16) * 4;
        assert_eq!(&rgba[centre..centre + 4], &[255, 255, 255, 255]);
        assert_eq!(&rgba[0..4], &[255, 255, 255, 255]);
        // a pixel on the +x axis inside the shell is coloured
        let p = (16 * 32 + 28) * 4;
        assert_ne!(&rgba[p..p + 4], &[255, 255, 255, 255]);
    }

    #[test]
    fn test_write_png_file() {
        let dir = tempdir().unwrap();
        let mut writer = PngSnapshotWriter::new(&dir.path().join("frames"), 16).unwrap();
        writer.write(3, &slice()).unwrap();
        let bytes = fs::read(writer.frame_path(3)).unwrap();
        assert!(writer.frame_path(3).ends_with("T_0003.png"));
        assert_eq!(&bytes[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        assert_eq!(&bytes[12..16], b"IHDR");
        assert_eq!(u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]), 16);
        assert_eq!(&bytes[bytes.len() - 8..bytes.len() - 4], b"IEND");
    }

    #[test]
    fn test_crc_and_adler_known_values() {
        assert_eq!(png_crc32(b"IEND"), 0xAE42_6082);
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
    }
}
