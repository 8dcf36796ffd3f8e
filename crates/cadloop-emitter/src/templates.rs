//! Fixed script sections and per-operation part templates

use cadloop_graph::Part;
use cadloop_plan::PartOperation;

pub(crate) const PREAMBLE: &str = "from build123d import *
from math import *

try:
    from build123d import export_stl, export_step
except ImportError:
    pass

";

/// Assembly block combining the given parts; empty for no parts
pub(crate) fn assembly(safe_names: &[String]) -> String {
    if safe_names.is_empty() {
        return String::new();
    }
    let children = safe_names
        .iter()
        .map(|n| format!("{n}_part.part"))
        .collect::<Vec<_>>()
        .join(", ");
    format!("# === Assembly ===\ncompound = Compound(children=[{children}])\n\n")
}

/// Export block writing STL, falling back to STEP
pub(crate) fn export(output_dir: &str) -> String {
    format!(
        r#"# === Export ===
import os
os.makedirs("{output_dir}", exist_ok=True)

try:
    export_stl(compound, "{output_dir}/model.stl")
    print("Exported to {output_dir}/model.stl")
except Exception as e:
    print(f"STL export failed: {{e}}")
    try:
        export_step(compound, "{output_dir}/model.step")
        print("Exported to {output_dir}/model.step")
    except Exception as e2:
        print(f"STEP export failed: {{e2}}")
"#
    )
}

/// Starting code for a part; loft has no template of its own
pub(crate) fn part_template(part: &Part) -> String {
    match part.operation {
        PartOperation::Revolve => revolve(part),
        PartOperation::Extrude | PartOperation::Loft => extrude(part),
    }
}

fn param(part: &Part, key: &str, default: f64) -> f64 {
    part.parameters.get(key).copied().unwrap_or(default)
}

fn header(name: &str, part: &Part) -> String {
    let p = part.placement;
    format!(
        "# {name}: {desc}\n{name}_loc_x = {x:?}\n{name}_loc_y = {y:?}\n{name}_loc_z = {z:?}\n",
        desc = part.description,
        x = p.x,
        y = p.y,
        z = p.z,
    )
}

fn extrude(part: &Part) -> String {
    let name = part.safe_name();
    format!(
        "{header}{name}_width = {width:?}
{name}_depth = {depth:?}
{name}_height = {height:?}

with BuildSketch() as {name}_profile:
    Rectangle({name}_width, {name}_depth)

with BuildPart() as {name}_part:
    with Locations(({name}_loc_x, {name}_loc_y, {name}_loc_z)):
        add({name}_profile.sketch)
    extrude(amount={name}_height)
",
        header = header(&name, part),
        width = param(part, "width", 100.0),
        depth = param(part, "depth", 100.0),
        height = param(part, "height", 50.0),
    )
}

fn revolve(part: &Part) -> String {
    let name = part.safe_name();
    format!(
        "{header}{name}_radius = {radius:?}
{name}_angle = {angle:?}

with BuildSketch() as {name}_profile:
    Circle({name}_radius)

with BuildPart() as {name}_part:
    with Locations(({name}_loc_x, {name}_loc_y, {name}_loc_z)):
        add({name}_profile.sketch)
    revolve(axis=Axis.Y, revolution_arc={name}_angle)
",
        header = header(&name, part),
        radius = param(part, "radius", 50.0),
        angle = param(part, "angle", 360.0),
    )
}
