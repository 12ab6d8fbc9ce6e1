use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

/// One directory's worth of fixtures: the `.s` files directly inside it,
/// plus any subdirectories, each becoming a nested `mod`. Grouping by
/// directory like this (rather than emitting one `mod` per file) matters as
/// soon as two fixtures share a folder -- two sibling `mod dp { ... }`
/// blocks for the same name would collide.
#[derive(Default)]
struct Node {
    children: BTreeMap<String, Node>,
    files: Vec<PathBuf>,
}

fn main() {
    println!("cargo::rerun-if-changed=test/");

    let out_dir = std::env::var_os("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("tests.rs");
    let mut file = BufWriter::new(File::create(dest_path).unwrap());

    let mut root = Node::default();
    for entry in glob::glob("test/**/*.s").unwrap() {
        let entry = entry.unwrap();
        let relative = entry.strip_prefix("test").unwrap().to_owned();
        let mut node = &mut root;
        if let Some(parent) = relative.parent() {
            for component in parent.iter() {
                node = node.children.entry(component.to_string_lossy().into_owned()).or_default();
            }
        }
        node.files.push(entry);
    }

    write_node(&mut file, &root);
    file.flush().unwrap();
}

fn write_node(file: &mut impl Write, node: &Node) {
    for path in &node.files {
        let test_name = path.file_stem().unwrap().to_string_lossy();
        writeln!(file, "#[test]").unwrap();
        writeln!(file, "fn {test_name}() -> Result<(), crate::test::TestError> {{").unwrap();
        writeln!(
            file,
            "let src = std::fs::read_to_string({path:?}).map_err(|x| crate::test::TestError::FileError(x.to_string()))?;"
        )
        .unwrap();
        writeln!(file, "crate::test::test(&src)").unwrap();
        writeln!(file, "}}").unwrap();
        writeln!(file).unwrap();
    }
    for (name, child) in &node.children {
        writeln!(file, "mod {name} {{").unwrap();
        write_node(file, child);
        writeln!(file, "}}").unwrap();
        writeln!(file).unwrap();
    }
}
