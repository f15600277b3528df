//! Binary archive format for [`HitStore`] (§6): `{Vector<Hit>,
//! Vector<StreamStart>, Vector<StreamStop>, int nHitKeys}`, little-endian,
//! each vector length-prefixed by a `u32`. Round-trip is exact (§8.5).

use std::io::{Read, Write};

use tf_model::{Hit, HitKey};
use tf_state::HitStore;

use crate::error::ArchiveError;

fn write_u32<W: Write>(w: &mut W, v: u32) -> Result<(), ArchiveError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_u16<W: Write>(w: &mut W, v: u16) -> Result<(), ArchiveError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn write_f64<W: Write>(w: &mut W, v: f64) -> Result<(), ArchiveError> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32, ArchiveError> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u16<R: Read>(r: &mut R) -> Result<u16, ArchiveError> {
    let mut buf = [0u8; 2];
    r.read_exact(&mut buf)?;
    Ok(u16::from_le_bytes(buf))
}

fn read_f64<R: Read>(r: &mut R) -> Result<f64, ArchiveError> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

fn write_hit<W: Write>(w: &mut W, hit: &Hit) -> Result<(), ArchiveError> {
    write_u32(w, hit.id)?;
    write_u16(w, hit.station)?;
    write_f64(w, hit.x)?;
    write_f64(w, hit.y)?;
    write_f64(w, hit.z)?;
    write_f64(w, hit.t)?;
    write_f64(w, hit.dx2)?;
    write_f64(w, hit.dy2)?;
    write_f64(w, hit.dxy)?;
    write_f64(w, hit.dt2)?;
    write_f64(w, hit.range_x)?;
    write_f64(w, hit.range_y)?;
    write_f64(w, hit.range_t)?;
    write_u32(w, hit.front_key)?;
    write_u32(w, hit.back_key)?;
    Ok(())
}

fn read_hit<R: Read>(r: &mut R) -> Result<Hit, ArchiveError> {
    let id = read_u32(r)?;
    let station = read_u16(r)?;
    let x = read_f64(r)?;
    let y = read_f64(r)?;
    let z = read_f64(r)?;
    let t = read_f64(r)?;
    let dx2 = read_f64(r)?;
    let dy2 = read_f64(r)?;
    let dxy = read_f64(r)?;
    let dt2 = read_f64(r)?;
    let range_x = read_f64(r)?;
    let range_y = read_f64(r)?;
    let range_t = read_f64(r)?;
    let front_key: HitKey = read_u32(r)?;
    let back_key: HitKey = read_u32(r)?;
    Ok(Hit { id, station, x, y, z, t, dx2, dy2, dxy, dt2, range_x, range_y, range_t, front_key, back_key })
}

fn write_u32_vec<W: Write>(w: &mut W, values: &[u32]) -> Result<(), ArchiveError> {
    write_u32(w, values.len() as u32)?;
    for &v in values {
        write_u32(w, v)?;
    }
    Ok(())
}

fn read_u32_vec<R: Read>(r: &mut R) -> Result<Vec<u32>, ArchiveError> {
    let len = read_u32(r)? as usize;
    let mut out = Vec::with_capacity(len);
    for _ in 0..len {
        out.push(read_u32(r)?);
    }
    Ok(out)
}

/// Writes `store` in the §6 archive layout.
pub fn write_hit_store<W: Write>(store: &HitStore, w: &mut W) -> Result<(), ArchiveError> {
    write_u32(w, store.n_hits() as u32)?;
    for hit in store.hits() {
        write_hit(w, hit)?;
    }
    write_u32_vec(w, store.stream_starts())?;
    write_u32_vec(w, store.stream_stops())?;
    write_u32(w, store.n_hit_keys())?;
    Ok(())
}

/// Reads a `HitStore` previously written by [`write_hit_store`]. The result
/// is assembled with [`HitStore::from_raw_parts`]: an on-disk archive is
/// trusted, not re-validated against [`tf_state::HitStoreBuilder`]'s
/// invariants (the external unpacker is responsible for those, per §6/§7).
pub fn read_hit_store<R: Read>(r: &mut R) -> Result<HitStore, ArchiveError> {
    let n_hits = read_u32(r)? as usize;
    let mut hits = Vec::with_capacity(n_hits);
    for _ in 0..n_hits {
        hits.push(read_hit(r)?);
    }
    let stream_start = read_u32_vec(r)?;
    let stream_stop = read_u32_vec(r)?;
    let n_hit_keys = read_u32(r)?;
    Ok(HitStore::from_raw_parts(hits, stream_start, stream_stop, n_hit_keys))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tf_state::HitStoreBuilder;

    fn sample_hit(id: u32, front: u32, back: u32) -> Hit {
        Hit {
            id,
            station: 3,
            x: 1.5,
            y: -2.25,
            z: 100.0,
            t: 12.0,
            dx2: 0.01,
            dy2: 0.02,
            dxy: 0.001,
            dt2: 0.5,
            range_x: 0.3,
            range_y: 0.3,
            range_t: 1.0,
            front_key: front,
            back_key: back,
        }
    }

    #[test]
    fn round_trips_exactly() {
        let hits = vec![sample_hit(0, 0, 1), sample_hit(1, 2, 3), sample_hit(2, 4, 5)];
        let store = HitStoreBuilder::new(6).with_hits(hits).with_stream_starts(vec![0, 2]).build().unwrap();

        let mut buf = Vec::new();
        write_hit_store(&store, &mut buf).unwrap();
        let restored = read_hit_store(&mut buf.as_slice()).unwrap();

        assert_eq!(restored.n_hits(), store.n_hits());
        assert_eq!(restored.n_hit_keys(), store.n_hit_keys());
        for i in 0..store.n_hits() as u32 {
            assert_eq!(restored.hit(i), store.hit(i));
        }
        assert_eq!(restored.stream_starts(), store.stream_starts());
        assert_eq!(restored.stream_stops(), store.stream_stops());
    }

    #[test]
    fn round_trips_empty_store() {
        let store = HitStoreBuilder::new(0).build().unwrap();
        let mut buf = Vec::new();
        write_hit_store(&store, &mut buf).unwrap();
        let restored = read_hit_store(&mut buf.as_slice()).unwrap();
        assert_eq!(restored.n_hits(), 0);
        assert_eq!(restored.n_streams(), 0);
    }

    #[test]
    fn truncated_archive_errors_instead_of_panicking() {
        let hits = vec![sample_hit(0, 0, 1)];
        let store = HitStoreBuilder::new(2).with_hits(hits).with_stream_starts(vec![0]).build().unwrap();
        let mut buf = Vec::new();
        write_hit_store(&store, &mut buf).unwrap();
        buf.truncate(buf.len() - 4);
        assert!(read_hit_store(&mut buf.as_slice()).is_err());
    }
}
