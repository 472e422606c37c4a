use live_detect::{BoundingBox, Detection, DrawOp, Frame, OverlayRenderer, OverlayStyle};

fn cup() -> Detection {
    Detection::new("cup", 0.82, BoundingBox::new(10.0, 20.0, 50.0, 60.0))
}

fn strokes(ops: &[DrawOp]) -> Vec<&DrawOp> {
    ops.iter()
        .filter(|op| matches!(op, DrawOp::StrokeRect { .. }))
        .collect()
}

#[test]
fn one_box_and_one_label_per_detection() {
    let mut renderer = OverlayRenderer::default();
    let canvas = renderer.render(&Frame::solid(640, 480, [20, 20, 20], 1), &[cup()]);

    assert_eq!((canvas.width(), canvas.height()), (640, 480));
    assert_eq!(
        strokes(canvas.ops()),
        vec![&DrawOp::StrokeRect {
            x: 10,
            y: 20,
            width: 50,
            height: 60,
            thickness: 2,
        }]
    );
    let labels = canvas.labels();
    assert_eq!(labels.len(), 1);
    assert!(labels[0].contains("cup"));
    assert!(labels[0].contains("82%"));
}

#[test]
fn empty_detections_draw_only_the_frame() {
    let mut renderer = OverlayRenderer::default();
    let canvas = renderer.render(&Frame::solid(64, 48, [5, 5, 5], 7), &[]);
    assert_eq!(
        canvas.ops(),
        &[
            DrawOp::Resize {
                width: 64,
                height: 48
            },
            DrawOp::DrawFrame { sequence: 7 },
        ]
    );
    assert_eq!(canvas.image().get_pixel(10, 10).0, [5, 5, 5, 255]);
}

#[test]
fn each_pass_replaces_the_previous_one() {
    let mut renderer = OverlayRenderer::default();
    let person = Detection::new("person", 0.91, BoundingBox::new(100.0, 100.0, 80.0, 200.0));
    renderer.render(&Frame::solid(640, 480, [0, 0, 0], 1), &[cup(), person]);
    assert_eq!(strokes(renderer.canvas().ops()).len(), 2);

    let canvas = renderer.render(&Frame::solid(320, 240, [0, 0, 0], 2), &[cup()]);
    assert_eq!((canvas.width(), canvas.height()), (320, 240));
    assert_eq!(strokes(canvas.ops()).len(), 1);
    assert_eq!(canvas.labels(), vec!["cup 82%"]);
}

#[test]
fn thickness_follows_style() {
    let style = OverlayStyle {
        box_thickness: 4,
        ..OverlayStyle::default()
    };
    let mut renderer = OverlayRenderer::new(style, Default::default());
    let canvas = renderer.render(&Frame::solid(100, 100, [0, 0, 0], 1), &[cup()]);
    assert!(matches!(
        strokes(canvas.ops())[0],
        DrawOp::StrokeRect { thickness: 4, .. }
    ));
    // Inner edge of a 4px stroke.
    assert_eq!(canvas.image().get_pixel(13, 50).0, [0, 255, 255, 255]);
    assert_eq!(canvas.image().get_pixel(14, 50).0, [0, 0, 0, 255]);
}
