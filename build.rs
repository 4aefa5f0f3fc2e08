use vergen_gitcl::{Build, Cargo, Emitter};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let build = Build::builder().build_timestamp(true).build();
    let cargo = Cargo::builder().build();

    Emitter::default()
        .add_instructions(&build)?
        .add_instructions(&cargo)?
        .emit()?;

    Ok(())
}
