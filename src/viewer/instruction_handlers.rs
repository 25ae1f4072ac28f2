use std::sync::{Arc, Weak};

use anyhow::Context;
use log::trace;
use serde::de::DeserializeOwned;
use serde_json::Value;
use simview_assets::descriptors::{
    BodyDescriptor, GeometryDescriptor, MaterialDescriptor, TextureDescriptor, TransformBatch,
};

use crate::networking::connection::Connection;
use crate::viewer::application::ViewerApplication;

pub const LOAD_MESH: &str = "LOAD_MESH";
pub const LOAD_TEXTURE: &str = "LOAD_TEXTURE";
pub const LOAD_MATERIAL: &str = "LOAD_MATERIAL";
pub const LOAD_COMPLETE: &str = "LOAD_COMPLETE";
pub const RESET: &str = "RESET";
pub const UPDATE_TRANSFORM: &str = "UPDATE_TRANSFORM";
pub const CREATE_OBJECT: &str = "CREATE_OBJECT";

pub fn register_instructions(connection: &Connection, app: &Weak<ViewerApplication>) {
    connection.register_handler(
        LOAD_MESH,
        with_app(app.clone(), |app, body| {
            app.load_mesh(parse_body::<GeometryDescriptor>(LOAD_MESH, body)?);
            Ok(())
        }),
    );

    connection.register_handler(
        LOAD_TEXTURE,
        with_app(app.clone(), |app, body| {
            app.load_texture(parse_body::<TextureDescriptor>(LOAD_TEXTURE, body)?);
            Ok(())
        }),
    );

    connection.register_handler(
        LOAD_MATERIAL,
        with_app(app.clone(), |app, body| {
            let descriptor = parse_body::<MaterialDescriptor>(LOAD_MATERIAL, body)?;
            Ok(app.load_material(&descriptor)?)
        }),
    );

    connection.register_handler(
        LOAD_COMPLETE,
        with_app(app.clone(), |app, _| {
            app.load_complete();
            Ok(())
        }),
    );

    connection.register_handler(
        RESET,
        with_app(app.clone(), |app, _| {
            app.reset();
            Ok(())
        }),
    );

    connection.register_handler(
        UPDATE_TRANSFORM,
        with_app(app.clone(), |app, body| {
            // Sent without body when nothing moved.
            if body.is_none() {
                trace!("Empty transform update");
                return Ok(());
            }
            app.update_transforms(&parse_body::<TransformBatch>(UPDATE_TRANSFORM, body)?);
            Ok(())
        }),
    );

    connection.register_handler(
        CREATE_OBJECT,
        with_app(app.clone(), |app, body| {
            let descriptor = parse_body::<BodyDescriptor>(CREATE_OBJECT, body)?;
            Ok(app.create_object(&descriptor)?)
        }),
    );
}

fn with_app<F>(app: Weak<ViewerApplication>, handler: F) -> impl Fn(Option<Value>) -> anyhow::Result<()> + Send + Sync + 'static
where
    F: Fn(&Arc<ViewerApplication>, Option<Value>) -> anyhow::Result<()> + Send + Sync + 'static,
{
    move |body| {
        let app = app.upgrade().context("The viewer has already been dropped")?;
        handler(&app, body)
    }
}

fn parse_body<T: DeserializeOwned>(tag: &str, body: Option<Value>) -> anyhow::Result<T> {
    let body = body.with_context(|| format!("{} requires a body", tag))?;
    serde_json::from_value(body).with_context(|| format!("Malformed {} body", tag))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_descriptors() -> anyhow::Result<()> {
        let batch: TransformBatch = parse_body(
            UPDATE_TRANSFORM,
            Some(json!({"arm": {"position": [1, 2, 3], "quaternion": [0, 0, 0, 1]}})),
        )?;
        assert_eq!(batch["arm"].position, [1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn missing_and_malformed_bodies_fail() {
        let err = parse_body::<BodyDescriptor>(CREATE_OBJECT, None).unwrap_err();
        assert!(err.to_string().contains("requires a body"));

        let err = parse_body::<BodyDescriptor>(CREATE_OBJECT, Some(json!({"visuals": 3}))).unwrap_err();
        assert!(err.to_string().contains("Malformed CREATE_OBJECT"));
    }
}
