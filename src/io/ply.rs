use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array2, Axis};
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;
use ply_rs::{parser, ply};
use tracing::debug;

use crate::error::{Error, Result};
use crate::pointcloud::PointCloud;

/// Vertex fields used by a point cloud. Accepts float and double coordinates.
#[derive(Debug)]
struct Vertex {
    point: [f64; 3],
    normal: [f64; 3],
}

impl ply::PropertyAccess for Vertex {
    fn new() -> Self {
        Vertex {
            point: [0.0; 3],
            normal: [0.0; 3],
        }
    }

    fn set_property(&mut self, key: String, property: ply::Property) {
        let value = match property {
            ply::Property::Float(v) => v as f64,
            ply::Property::Double(v) => v,
            _ => return,
        };
        match key.as_ref() {
            "x" => self.point[0] = value,
            "y" => self.point[1] = value,
            "z" => self.point[2] = value,
            "nx" => self.normal[0] = value,
            "ny" => self.normal[1] = value,
            "nz" => self.normal[2] = value,
            _ => (),
        }
    }
}

/// Reads the vertices (and normals, when every vertex has `nx`, `ny` and
/// `nz`) of a PLY file. Other elements, like faces, are skipped.
pub fn read_ply<P>(filepath: P) -> Result<PointCloud>
where
    P: AsRef<Path>,
{
    let filepath = filepath.as_ref();
    let mut f = BufReader::new(File::open(filepath)?);

    let vertex_parser = parser::Parser::<Vertex>::new();
    let header = vertex_parser.read_header(&mut f)?;

    let mut pcl = None;
    for (_ignore_key, element) in &header.elements {
        match element.name.as_ref() {
            "vertex" => {
                let vertex_vec = vertex_parser.read_payload_for_element(&mut f, element, &header)?;
                let points =
                    Array2::from_shape_fn((vertex_vec.len(), 3), |(i, c)| vertex_vec[i].point[c]);
                let mut cloud = PointCloud::new(points)?;

                if ["nx", "ny", "nz"]
                    .iter()
                    .all(|k| element.properties.contains_key(*k))
                {
                    cloud = cloud.with_normals(Array2::from_shape_fn(
                        (vertex_vec.len(), 3),
                        |(i, c)| vertex_vec[i].normal[c],
                    ))?;
                }
                pcl = Some(cloud);
            }
            other => {
                debug!(element = other, "Skipping PLY element");
                parser::Parser::<DefaultElement>::new()
                    .read_payload_for_element(&mut f, element, &header)?;
            }
        }
    }

    pcl.ok_or_else(|| Error::Parser(format!("{} has no vertex element", filepath.display())))
}

/// Writes the points, and the normals if any, as double precision ascii PLY.
pub fn write_ply<P>(filepath: P, pcl: &PointCloud) -> Result<()>
where
    P: AsRef<Path>,
{
    let mut ply = {
        let mut ply = Ply::<DefaultElement>::new();
        let mut vertex_element = ElementDef::new("vertex".to_string());
        ["x", "y", "z"].iter().for_each(|key| {
            vertex_element.properties.add(PropertyDef::new(
                key.to_string(),
                PropertyType::Scalar(ScalarType::Double),
            ));
        });

        let mut vertex_array: Vec<DefaultElement> = pcl
            .points
            .axis_iter(Axis(0))
            .map(|point| {
                let mut elem = DefaultElement::new();
                elem.insert("x".to_string(), Property::Double(point[0]));
                elem.insert("y".to_string(), Property::Double(point[1]));
                elem.insert("z".to_string(), Property::Double(point[2]));
                elem
            })
            .collect();

        if let Some(normals) = &pcl.normals {
            ["nx", "ny", "nz"].iter().for_each(|key| {
                vertex_element.properties.add(PropertyDef::new(
                    key.to_string(),
                    PropertyType::Scalar(ScalarType::Double),
                ));
            });

            normals
                .axis_iter(Axis(0))
                .enumerate()
                .for_each(|(i, normal)| {
                    vertex_array[i].insert("nx".to_string(), Property::Double(normal[0]));
                    vertex_array[i].insert("ny".to_string(), Property::Double(normal[1]));
                    vertex_array[i].insert("nz".to_string(), Property::Double(normal[2]));
                });
        }

        ply.header.elements.add(vertex_element);
        ply.payload.insert("vertex".to_string(), vertex_array);
        ply.make_consistent()
            .map_err(|err| Error::Parser(format!("inconsistent PLY: {err:?}")))?;
        ply
    };

    ply.header.encoding = Encoding::Ascii;

    let mut buf = BufWriter::new(File::create(filepath)?);
    Writer::new().write_ply(&mut buf, &mut ply)?;

    Ok(())
}
