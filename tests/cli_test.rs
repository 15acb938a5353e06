use assert_cmd::prelude::*; // Add methods on commands
use predicates::prelude::*;
use std::path::Path;
use std::process::Command; // Run programs
use tempfile;
use retrograph::{bmp,PixelBuffer};
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

// Something that looks like a graphics chunk, with runs and a skewed histogram.
fn sample_chunk() -> Vec<u8> {
    let mut ans = Vec::new();
    for i in 0..3000usize {
        match i % 7 {
            0 | 1 | 2 => ans.push(0),
            3 => ans.push(0xff),
            _ => ans.push((i * 31 % 97) as u8)
        }
    }
    ans
}

fn sample_image(w: usize,h: usize,bpp: usize) -> PixelBuffer {
    let mut img = PixelBuffer::create(w,h,bpp).expect("create failed");
    for y in 0..h {
        for x in 0..w {
            img.put_pixel(x as i32,y as i32,((x + 2*y) ^ (x >> 1)) as u8);
        }
    }
    img
}

fn write_image(dir: &Path,name: &str,img: &PixelBuffer) -> Result<String,Box<dyn std::error::Error>> {
    let path = dir.join(name);
    bmp::save(&path,img,false,&bmp::Palettes::default())?;
    Ok(path.to_string_lossy().to_string())
}

#[test]
fn huffman_round_trip() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let raw_path = temp_dir.path().join("egagraph.raw");
    let cmp_path = temp_dir.path().join("egagraph.huf");
    let dict_path = temp_dir.path().join("egadict.bin");
    let out_path = temp_dir.path().join("egagraph.out");
    let raw = sample_chunk();
    std::fs::write(&raw_path,&raw)?;
    Command::cargo_bin("retrograph")?
        .arg("compress")
        .arg("-i").arg(&raw_path)
        .arg("-o").arg(&cmp_path)
        .arg("-d").arg(&dict_path)
        .arg("-t").arg("1")
        .assert()
        .success();
    let compressed = std::fs::read(&cmp_path)?;
    assert_eq!(compressed[0..4].to_vec(),u32::to_le_bytes(raw.len() as u32).to_vec());
    assert!(compressed.len() < raw.len());
    assert_eq!(std::fs::read(&dict_path)?.len(),1024);
    Command::cargo_bin("retrograph")?
        .arg("expand")
        .arg("-i").arg(&cmp_path)
        .arg("-o").arg(&out_path)
        .arg("-d").arg(&dict_path)
        .assert()
        .success();
    assert_eq!(std::fs::read(&out_path)?,raw);
    Ok(())
}

#[test]
fn dictionary_at_offset() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let raw_path = temp_dir.path().join("chunk.raw");
    let cmp_path = temp_dir.path().join("chunk.huf");
    let dict_path = temp_dir.path().join("dict.bin");
    let exe_path = temp_dir.path().join("game.exe");
    let out_path = temp_dir.path().join("chunk.out");
    std::fs::write(&raw_path,b"I am Sam. Sam I am. I do not like this Sam I am.\n")?;
    Command::cargo_bin("retrograph")?
        .arg("compress")
        .arg("-i").arg(&raw_path)
        .arg("-o").arg(&cmp_path)
        .arg("-d").arg(&dict_path)
        .assert()
        .success();
    // dictionary embedded in some other file
    let exe = [vec![0x4d,0x5a,0,0,0,0,0,0,0,0,0,0,0,0,0,0],std::fs::read(&dict_path)?].concat();
    std::fs::write(&exe_path,exe)?;
    Command::cargo_bin("retrograph")?
        .arg("expand")
        .arg("-i").arg(&cmp_path)
        .arg("-o").arg(&out_path)
        .arg("-d").arg(&exe_path)
        .arg("--dict-offset").arg("16")
        .assert()
        .success();
    assert_eq!(std::fs::read(&out_path)?,std::fs::read(&raw_path)?);
    Ok(())
}

#[test]
fn split_and_merge() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let img = sample_image(24,16,4);
    let in_path = write_image(temp_dir.path(),"tile.bmp",&img)?;
    let prefix = temp_dir.path().join("plane");
    Command::cargo_bin("retrograph")?
        .arg("split")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&prefix)
        .arg("-c").arg("4")
        .assert()
        .success();
    let mut cmd = Command::cargo_bin("retrograph")?;
    let out_path = temp_dir.path().join("merged.bmp");
    cmd.arg("merge").arg("-o").arg(&out_path).arg("-b").arg("4");
    for i in 0..4 {
        let plane_path = temp_dir.path().join(format!("plane_{}.bmp",i));
        assert_eq!(bmp::load(&plane_path)?.bpp().bits(),1);
        cmd.arg(plane_path);
    }
    cmd.assert().success();
    assert_eq!(bmp::load(&out_path)?,img);
    Ok(())
}

#[test]
fn munge_and_demunge() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let img = sample_image(32,8,8);
    let in_path = write_image(temp_dir.path(),"sprite.bmp",&img)?;
    let prefix = temp_dir.path().join("column");
    Command::cargo_bin("retrograph")?
        .arg("munge")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(&prefix)
        .arg("-c").arg("4")
        .assert()
        .success();
    let first = bmp::load(temp_dir.path().join("column_0.bmp"))?;
    assert_eq!((first.width(),first.height()),(8,8));
    let out_path = temp_dir.path().join("back.bmp");
    let mut cmd = Command::cargo_bin("retrograph")?;
    cmd.arg("demunge").arg("-o").arg(&out_path);
    for i in 0..4 {
        cmd.arg(temp_dir.path().join(format!("column_{}.bmp",i)));
    }
    cmd.assert().success();
    assert_eq!(bmp::load(&out_path)?,img);
    Ok(())
}

#[test]
fn bad_plane_range() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = write_image(temp_dir.path(),"vga.bmp",&sample_image(8,8,8))?;
    Command::cargo_bin("retrograph")?
        .arg("split")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(temp_dir.path().join("plane"))
        .arg("-s").arg("6")
        .arg("-c").arg("4")
        .assert()
        .failure()
        .stderr(predicate::str::contains("PlaneRange"));
    assert!(!temp_dir.path().join("plane_0.bmp").exists());
    Ok(())
}

#[test]
fn uneven_munge() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = write_image(temp_dir.path(),"odd.bmp",&sample_image(10,2,4))?;
    Command::cargo_bin("retrograph")?
        .arg("munge")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(temp_dir.path().join("column"))
        .arg("-c").arg("4")
        .assert()
        .failure()
        .stderr(predicate::str::contains("WidthNotDivisible"));
    Ok(())
}

#[test]
fn not_a_bitmap() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = temp_dir.path().join("fake.bmp");
    std::fs::write(&in_path,b"PK this is not a bitmap at all, just some bytes to fill the headers")?;
    Command::cargo_bin("retrograph")?
        .arg("split")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(temp_dir.path().join("plane"))
        .arg("-c").arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("FileFormatMismatch"));
    Ok(())
}

#[test]
fn backups_are_kept() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let in_path = write_image(temp_dir.path(),"tile.bmp",&sample_image(8,8,4))?;
    let prefix = temp_dir.path().join("plane");
    for _i in 0..2 {
        Command::cargo_bin("retrograph")?
            .arg("split")
            .arg("-i").arg(&in_path)
            .arg("-o").arg(&prefix)
            .arg("-c").arg("2")
            .arg("-b").arg("2")
            .arg("--backup")
            .assert()
            .success();
    }
    assert!(temp_dir.path().join("plane_0.bmp.bak0").is_file());
    assert!(temp_dir.path().join("plane_1.bmp.bak0").is_file());
    assert!(!temp_dir.path().join("plane_0.bmp.bak1").exists());
    Ok(())
}

#[test]
fn custom_palette() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let mut pal_src = bmp::encode(&sample_image(4,4,8),&bmp::Palettes::default())?;
    pal_src[54..58].copy_from_slice(&[0x10,0x20,0x30,0x00]);
    let pal_path = temp_dir.path().join("palette.bmp");
    std::fs::write(&pal_path,pal_src)?;
    let in_path = write_image(temp_dir.path(),"vga.bmp",&sample_image(8,4,8))?;
    Command::cargo_bin("retrograph")?
        .arg("munge")
        .arg("-i").arg(&in_path)
        .arg("-o").arg(temp_dir.path().join("column"))
        .arg("-c").arg("2")
        .arg("-p").arg(&pal_path)
        .assert()
        .success();
    let out = std::fs::read(temp_dir.path().join("column_0.bmp"))?;
    assert_eq!(out[54..58].to_vec(),vec![0x10,0x20,0x30,0x00]);
    Ok(())
}

#[test]
fn compress_keeps_backups() -> STDRESULT {
    let temp_dir = tempfile::tempdir()?;
    let raw_path = temp_dir.path().join("font.raw");
    let cmp_path = temp_dir.path().join("font.huf");
    let dict_path = temp_dir.path().join("font.dic");
    std::fs::write(&raw_path,sample_chunk())?;
    for _i in 0..2 {
        Command::cargo_bin("retrograph")?
            .arg("compress")
            .arg("-i").arg(&raw_path)
            .arg("-o").arg(&cmp_path)
            .arg("-d").arg(&dict_path)
            .arg("--backup")
            .assert()
            .success();
    }
    assert_eq!(std::fs::read(temp_dir.path().join("font.huf.bak0"))?,std::fs::read(&cmp_path)?);
    assert_eq!(std::fs::read(temp_dir.path().join("font.dic.bak0"))?.len(),1024);
    assert!(!temp_dir.path().join("font.huf.bak1").exists());
    Ok(())
}
