pub mod adjacency;
pub mod info;
pub mod paint;

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Write;
    use std::path::{Path, PathBuf};
    use zip::write::SimpleFileOptions;

    use crate::{Cli, Commands, OutputFormat};

    pub const CUBE_MODEL: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<model unit="millimeter" xmlns="http://schemas.microsoft.com/3dmanufacturing/core/2015/02">
 <resources>
  <object id="1" name="Cube" type="model">
   <mesh>
    <vertices>
     <vertex x="0" y="0" z="0"/><vertex x="10" y="0" z="0"/><vertex x="10" y="10" z="0"/><vertex x="0" y="10" z="0"/>
     <vertex x="0" y="0" z="10"/><vertex x="10" y="0" z="10"/><vertex x="10" y="10" z="10"/><vertex x="0" y="10" z="10"/>
    </vertices>
    <triangles>
     <triangle v1="0" v2="2" v3="1"/><triangle v1="0" v2="3" v3="2"/>
     <triangle v1="4" v2="5" v3="6"/><triangle v1="4" v2="6" v3="7"/>
     <triangle v1="0" v2="1" v3="5"/><triangle v1="0" v2="5" v3="4"/>
     <triangle v1="3" v2="7" v3="6"/><triangle v1="3" v2="6" v3="2"/>
     <triangle v1="0" v2="4" v3="7"/><triangle v1="0" v2="7" v3="3"/>
     <triangle v1="1" v2="2" v3="6"/><triangle v1="1" v2="6" v3="5"/>
    </triangles>
   </mesh>
  </object>
 </resources>
 <build><item objectid="1"/></build>
</model>
"#;

    /// Write a package holding `model` as `dir/name`.
    pub fn write_3mf(dir: &Path, name: &str, model: &str) -> PathBuf {
        let path = dir.join(name);
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        writer.start_file("_rels/.rels", options).unwrap();
        writer.write_all(b"<Relationships/>").unwrap();
        writer.start_file("3D/3dmodel.model", options).unwrap();
        writer.write_all(model.as_bytes()).unwrap();
        writer.finish().unwrap();
        path
    }

    /// Write a one-cube package into `dir`.
    pub fn write_cube_3mf(dir: &Path) -> PathBuf {
        write_3mf(dir, "cube.3mf", CUBE_MODEL)
    }

    pub fn quiet_cli(input: &Path) -> Cli {
        Cli {
            command: Commands::Info {
                input: input.to_path_buf(),
            },
            format: OutputFormat::Json,
            quiet: true,
            verbose: 0,
        }
    }
}
