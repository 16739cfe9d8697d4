use crate::cli::LibraryArgs;
use crate::error::Result;
use fragforge::core::library::{
    fragment_space::{BuildingBlock, FragmentSpace},
    ring_closures::RingClosuresArchive,
};
use fragforge::core::models::vertex::BuildingBlockType;
use itertools::Itertools;
use std::io::Write;
use tracing::info;

fn write_blocks<W: Write>(
    writer: &mut W,
    title: &str,
    blocks: &[BuildingBlock],
) -> std::io::Result<()> {
    writeln!(writer, "{} ({}):", title, blocks.len())?;
    for (id, block) in blocks.iter().enumerate() {
        let classes = block
            .attachment_points
            .iter()
            .map(|ap| ap.class.to_string())
            .join(",");
        let ring = if block.ring_closing { " ring-closing" } else { "" };
        writeln!(
            writer,
            "  [{id}] {:<16} heavy-atoms={:<3} fitness={:<8.3} aps={}{ring}",
            block.name, block.heavy_atoms, block.fitness, classes
        )?;
    }
    Ok(())
}

/// Lists every building block of `space`, grouped by kind, and the size of `archive`.
fn summarize<W: Write>(
    mut writer: W,
    space: &FragmentSpace,
    archive: Option<&RingClosuresArchive>,
) -> std::io::Result<()> {
    write_blocks(&mut writer, "Scaffolds", space.building_blocks(BuildingBlockType::Scaffold))?;
    write_blocks(&mut writer, "Fragments", space.building_blocks(BuildingBlockType::Fragment))?;
    write_blocks(&mut writer, "Capping groups", space.building_blocks(BuildingBlockType::Cap))?;
    if let Some(archive) = archive {
        writeln!(writer, "Closable chains: {}", archive.len())?;
    }
    writer.flush()
}

pub fn run(args: LibraryArgs) -> Result<()> {
    info!("Loading building-block library from {:?}", &args.library);
    let space = FragmentSpace::load(&args.library)?;
    let archive = args
        .ring_closures
        .as_deref()
        .map(RingClosuresArchive::load)
        .transpose()?;
    summarize(std::io::stdout().lock(), &space, archive.as_ref())?;
    Ok(())
}
