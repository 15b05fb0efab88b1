//! Extracts a hand-built, single-file exFAT volume image and checks the
//! file contents and byte count match the Stream entry's `data_length`
//! (quantified invariant 4).

use std::io::Cursor;

fn build_image() -> Vec<u8> {
    const SECTOR: usize = 512;
    let mut buf = vec![0u8;4 * SECTOR];

    // Boot sector (sector 0).
    buf[0..3].copy_from_slice(&[0xEB,0x76,0x90]);
    buf[3..11].copy_from_slice(b"EXFAT   ");
    buf[64..72].copy_from_slice(&0u64.to_le_bytes()); // partition_offset
    buf[72..80].copy_from_slice(&4u64.to_le_bytes()); // volume_length (sectors)
    buf[80..84].copy_from_slice(&1u32.to_le_bytes()); // fat_offset
    buf[84..88].copy_from_slice(&1u32.to_le_bytes()); // fat_length
    buf[88..92].copy_from_slice(&2u32.to_le_bytes()); // cluster_heap_offset
    buf[92..96].copy_from_slice(&2u32.to_le_bytes()); // cluster_count
    buf[96..100].copy_from_slice(&2u32.to_le_bytes()); // first_cluster_of_root_directory
    buf[108] = 9; // bytes_per_sector_shift -> 512
    buf[109] = 0; // sectors_per_cluster_shift -> 1 sector per cluster
    buf[110] = 1; // number_of_fats

    // FAT (sector 1): cluster 2 (root dir) and cluster 3 (file), both
    // single-cluster chains.
    let fat_off = SECTOR;
    buf[fat_off + 2*4 .. fat_off + 3*4].copy_from_slice(&0xFFFF_FFF8u32.to_le_bytes());
    buf[fat_off + 3*4 .. fat_off + 4*4].copy_from_slice(&0xFFFF_FFF8u32.to_le_bytes());

    // Root directory (sector 2, cluster 2): File + Stream + Name + terminator.
    let root_off = 2 * SECTOR;
    let name = "A.TXT";
    let data = b"HELLOWORLD";

    buf[root_off] = 0x85; // File entry
    buf[root_off + 1] = 2; // secondary_count
    buf[root_off + 4..root_off + 6].copy_from_slice(&0x0020u16.to_le_bytes()); // attributes

    let stream_off = root_off + 32;
    buf[stream_off] = 0xC0;
    buf[stream_off + 3] = name.chars().count() as u8;
    buf[stream_off + 20..stream_off + 24].copy_from_slice(&3u32.to_le_bytes()); // first_cluster
    buf[stream_off + 24..stream_off + 32].copy_from_slice(&(data.len() as u64).to_le_bytes());

    let name_off = stream_off + 32;
    buf[name_off] = 0xC1;
    for (i,c) in name.encode_utf16().enumerate() {
        let off = name_off + 2 + i * 2;
        buf[off..off+2].copy_from_slice(&c.to_le_bytes());
    }
    // terminator entry is already all-zero at name_off + 32.

    // File data (sector 3, cluster 3).
    let file_off = 3 * SECTOR;
    buf[file_off..file_off + data.len()].copy_from_slice(data);

    buf
}

#[test]
fn test_exfat_single_file_extraction() {
    let image = build_image();
    let mut ctx = bootctl::exfat::ExfatContext::open(Cursor::new(image)).unwrap();

    let dir = tempfile::tempdir().unwrap();
    ctx.extract_all(dir.path()).unwrap();

    let extracted = std::fs::read(dir.path().join("A.TXT")).unwrap();
    assert_eq!(extracted,b"HELLOWORLD");
}
