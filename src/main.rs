use clap::{arg,crate_version,value_parser,ArgMatches,Command};
use num_traits::FromPrimitive;
use std::io::Write;
use std::path::Path;
use retrograph::{bmp,huff,create_with_backup,PixelBuffer};
type STDRESULT = Result<(),Box<dyn std::error::Error>>;

const RCH: &str = "unreachable was reached";

fn palettes(cmd: &ArgMatches) -> Result<bmp::Palettes,Box<dyn std::error::Error>> {
    let mut pals = bmp::Palettes::default();
    if let Some(path) = cmd.get_one::<String>("palette") {
        pals.load_palette(path)?;
    }
    Ok(pals)
}

fn save_planes(planes: &[PixelBuffer],prefix: &str,backup: bool,pals: &bmp::Palettes) -> STDRESULT {
    for (i,plane) in planes.iter().enumerate() {
        bmp::save(format!("{}_{}.bmp",prefix,i),plane,backup,pals)?;
    }
    eprintln!("wrote {} planes",planes.len());
    Ok(())
}

fn load_planes(cmd: &ArgMatches) -> Result<Vec<PixelBuffer>,Box<dyn std::error::Error>> {
    let mut planes = Vec::new();
    for path in cmd.get_many::<String>("INPUT").expect(RCH) {
        planes.push(bmp::load(path)?);
    }
    Ok(planes)
}

fn main() -> STDRESULT
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let long_help =
"Examples:
---------
Compress:      `retrograph compress -i egagraph.raw -o egagraph.huf -d egadict.bin`
Expand:        `retrograph expand -i egagraph.huf -o egagraph.raw -d egadict.bin`
Split planes:  `retrograph split -i tile.bmp -o plane -s 0 -c 4 -b 1`
Merge planes:  `retrograph merge -o tile.bmp -b 4 plane_0.bmp plane_1.bmp plane_2.bmp plane_3.bmp`";

    let mut main_cmd = Command::new("retrograph")
        .about("Convert retro game graphics between planar data and BMP, compress with static Huffman")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(Command::new("compress")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(-d --dict <PATH> "dictionary output path").required(true))
        .arg(arg!(-t --trail [MODE] "trailing byte mode").value_parser(["0","1","2"]).default_value("0"))
        .arg(arg!(--backup "rename existing outputs to .bakN"))
        .about("compress a file, writing its dictionary"));

    main_cmd = main_cmd.subcommand(Command::new("expand")
        .arg(arg!(-i --input <PATH> "input path").required(true))
        .arg(arg!(-o --output <PATH> "output path").required(true))
        .arg(arg!(-d --dict <PATH> "dictionary path").required(true))
        .arg(arg!(--"dict-offset" [BYTES] "offset of the dictionary").value_parser(value_parser!(u64)).default_value("0"))
        .arg(arg!(--backup "rename existing outputs to .bakN"))
        .about("expand a file using a dictionary"));

    main_cmd = main_cmd.subcommand(Command::new("split")
        .arg(arg!(-i --input <PATH> "input BMP").required(true))
        .arg(arg!(-o --output <PREFIX> "output prefix").required(true))
        .arg(arg!(-s --start [BIT] "first bit").value_parser(value_parser!(usize)).default_value("0"))
        .arg(arg!(-c --count <N> "number of planes").value_parser(value_parser!(usize)).required(true))
        .arg(arg!(-b --bpp [BITS] "bits per plane").value_parser(value_parser!(usize)).default_value("1"))
        .arg(arg!(-p --palette [PATH] "256 color palette BMP"))
        .arg(arg!(--backup "rename existing outputs to .bakN"))
        .about("split bit planes into separate BMP files"));

    main_cmd = main_cmd.subcommand(Command::new("merge")
        .arg(arg!(-o --output <PATH> "output BMP").required(true))
        .arg(arg!(-b --bpp <BITS> "bits per pixel of the result").value_parser(value_parser!(usize)).required(true))
        .arg(arg!(-p --palette [PATH] "256 color palette BMP"))
        .arg(arg!(--backup "rename existing outputs to .bakN"))
        .arg(arg!(<INPUT> ... "planes, lowest bits first"))
        .about("merge bit planes into one BMP"));

    main_cmd = main_cmd.subcommand(Command::new("munge")
        .arg(arg!(-i --input <PATH> "input BMP").required(true))
        .arg(arg!(-o --output <PREFIX> "output prefix").required(true))
        .arg(arg!(-c --count <N> "number of planes").value_parser(value_parser!(usize)).required(true))
        .arg(arg!(-p --palette [PATH] "256 color palette BMP"))
        .arg(arg!(--backup "rename existing outputs to .bakN"))
        .about("deal columns out to separate BMP files"));

    main_cmd = main_cmd.subcommand(Command::new("demunge")
        .arg(arg!(-o --output <PATH> "output BMP").required(true))
        .arg(arg!(-p --palette [PATH] "256 color palette BMP"))
        .arg(arg!(--backup "rename existing outputs to .bakN"))
        .arg(arg!(<INPUT> ... "planes, leftmost column first"))
        .about("interleave the columns of several BMP files"));

    let matches = main_cmd.get_matches();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let path_dict = cmd.get_one::<String>("dict").expect(RCH);
        let trail_code = cmd.get_one::<String>("trail").expect(RCH).parse::<u8>()?;
        let trail = huff::TrailMode::from_u8(trail_code).expect(RCH);
        let backup = cmd.get_flag("backup");
        let dat = std::fs::read(path_in)?;
        let codec = huff::HuffmanCodec::from_frequencies(&huff::FrequencyTable::from_bytes(&dat))?;
        let compressed = codec.compress(&dat,dat.len()*2,trail)?;
        let mut dict_file = create_with_backup(Path::new(path_dict),backup)?;
        codec.write_dictionary(&mut dict_file)?;
        let mut out_file = create_with_backup(Path::new(path_out),backup)?;
        out_file.write_all(&u32::to_le_bytes(dat.len() as u32))?;
        out_file.write_all(&compressed)?;
        eprintln!("compressed {} into {}",dat.len(),compressed.len() + 4);
    }

    if let Some(cmd) = matches.subcommand_matches("expand") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let path_dict = cmd.get_one::<String>("dict").expect(RCH);
        let offset = *cmd.get_one::<u64>("dict-offset").expect(RCH);
        let backup = cmd.get_flag("backup");
        let mut codec = huff::HuffmanCodec::new();
        codec.read_dictionary(&mut std::fs::File::open(path_dict)?,offset)?;
        let dat = std::fs::read(path_in)?;
        if dat.len() < 4 {
            eprintln!("{} is too short",path_in);
            return Err(Box::new(retrograph::Error::FileFormatMismatch));
        }
        let out_len = u32::from_le_bytes([dat[0],dat[1],dat[2],dat[3]]) as usize;
        let expanded = codec.expand(&dat[4..],out_len);
        let mut out_file = create_with_backup(Path::new(path_out),backup)?;
        out_file.write_all(&expanded)?;
        eprintln!("expanded {} into {}",dat.len(),expanded.len());
    }

    if let Some(cmd) = matches.subcommand_matches("split") {
        let img = bmp::load(cmd.get_one::<String>("input").expect(RCH))?;
        let start = *cmd.get_one::<usize>("start").expect(RCH);
        let count = *cmd.get_one::<usize>("count").expect(RCH);
        let bpp = *cmd.get_one::<usize>("bpp").expect(RCH);
        let planes = img.split(start,count,bpp)?;
        save_planes(&planes,cmd.get_one::<String>("output").expect(RCH),cmd.get_flag("backup"),&palettes(cmd)?)?;
    }

    if let Some(cmd) = matches.subcommand_matches("merge") {
        let bpp = *cmd.get_one::<usize>("bpp").expect(RCH);
        let img = PixelBuffer::merge(&load_planes(cmd)?,bpp)?;
        bmp::save(cmd.get_one::<String>("output").expect(RCH),&img,cmd.get_flag("backup"),&palettes(cmd)?)?;
        eprintln!("merged into {}x{} at {} bpp",img.width(),img.height(),bpp);
    }

    if let Some(cmd) = matches.subcommand_matches("munge") {
        let img = bmp::load(cmd.get_one::<String>("input").expect(RCH))?;
        let count = *cmd.get_one::<usize>("count").expect(RCH);
        let planes = img.munge(count)?;
        save_planes(&planes,cmd.get_one::<String>("output").expect(RCH),cmd.get_flag("backup"),&palettes(cmd)?)?;
    }

    if let Some(cmd) = matches.subcommand_matches("demunge") {
        let planes = load_planes(cmd)?;
        let bpp = planes.first().map(|p| p.bpp().bits()).unwrap_or(8);
        let img = PixelBuffer::demunge(&planes,bpp)?;
        bmp::save(cmd.get_one::<String>("output").expect(RCH),&img,cmd.get_flag("backup"),&palettes(cmd)?)?;
        eprintln!("demunged into {}x{}",img.width(),img.height());
    }

    Ok(())
}
