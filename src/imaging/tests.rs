// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

use std::{fs, path::Path};

use indexmap::indexmap;

use super::*;
use crate::tests::{param, Fixture, RecordingEngine, AMP_CAL, PHASE_CAL, TARGET};

#[test]
fn imager_products() {
    let base = Path::new("out/TARGET/proj.TARGET.tclean");
    assert_eq!(
        Imager::Tclean.product(base),
        Path::new("out/TARGET/proj.TARGET.tclean.image")
    );
    assert_eq!(
        Imager::Wsclean.product(Path::new("out/TARGET/proj.TARGET.wsclean")),
        Path::new("out/TARGET/proj.TARGET.wsclean-image.fits")
    );
}

#[test]
fn wsclean_square_size() {
    let mut tasks = TaskSections::default();
    tasks.insert(
        TaskSection::Wsclean,
        indexmap! {
            "size".to_string() => ParamValue::Int(2048),
            "scale".to_string() => ParamValue::from("1asec"),
        },
    );
    let request = Imager::Wsclean.request(Path::new("a.ms"), Path::new("img"), &tasks);
    assert_eq!(request.task, EngineTask::Wsclean);
    assert_eq!(param(&request, "size"), &ParamValue::from("2048 2048"));
    assert_eq!(param(&request, "scale"), &ParamValue::from("1asec"));
    assert_eq!(param(&request, "name"), &ParamValue::from(Path::new("img")));
    assert_eq!(request.expected_outputs, vec![Path::new("img-image.fits")]);
}

#[test]
fn tclean_output_name_cannot_be_overridden() {
    let mut tasks = TaskSections::default();
    tasks.insert(
        TaskSection::Tclean,
        indexmap! {
            "imagename".to_string() => ParamValue::from("elsewhere"),
            "niter".to_string() => ParamValue::Int(1000),
        },
    );
    let request = Imager::Tclean.request(Path::new("a.ms"), Path::new("img"), &tasks);
    assert_eq!(
        param(&request, "imagename"),
        &ParamValue::from(Path::new("img"))
    );
    assert_eq!(param(&request, "niter"), &ParamValue::Int(1000));
}

#[test]
fn make_image_replaces_a_stale_product() {
    let fixture = Fixture::new();
    let base = fixture.names.image_base(TARGET, None).unwrap();
    let product = Imager::Tclean.product(&base);
    fs::create_dir_all(&product).unwrap();
    fs::write(product.join("table.dat"), "old").unwrap();

    let mut engine = RecordingEngine::new();
    let image = make_image(
        &mut engine,
        Imager::Tclean,
        &fixture.names.split(TARGET).unwrap(),
        &base,
        &fixture.params.tasks,
    )
    .unwrap();
    assert_eq!(image, product);
    // The engine writes a plain file, so the old directory must be gone.
    assert!(image.is_file());
}

#[test]
fn clean_images_every_present_source() {
    let mut fixture = Fixture::with_params(|p| p.sources.targets.push("ABSENT".to_string()));
    let mut engine = RecordingEngine::new();
    clean(&mut fixture.ctx(&mut engine)).unwrap();

    let requests = engine.requests_for(EngineTask::Tclean);
    let vis: Vec<_> = requests.iter().map(|r| r.vis.clone()).collect();
    assert_eq!(
        vis,
        vec![
            fixture.names.split(AMP_CAL).unwrap(),
            fixture.names.split(PHASE_CAL).unwrap(),
            fixture.names.split(TARGET).unwrap(),
        ]
    );
    for source in [AMP_CAL, PHASE_CAL, TARGET] {
        assert!(fixture.names.image(source, None).unwrap().exists());
    }
}
