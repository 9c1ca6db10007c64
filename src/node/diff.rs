use super::{NodeKind, RenderNode};
use crate::region::Region;

impl RenderNode {
    /// Add to `region` every area that may look different when drawing `new`
    /// instead of `self`.
    ///
    /// The result is conservative: it may include unchanged pixels, never
    /// the other way round.
    pub fn diff(&self, new: &RenderNode, region: &mut Region) {
        if self.ptr_eq(new) {
            return;
        }

        match (self.kind(), new.kind()) {
            (NodeKind::Container { children: a }, NodeKind::Container { children: b }) => {
                diff_children(a, b, region);
            }
            (
                NodeKind::Transform {
                    child: a,
                    transform: ta,
                },
                NodeKind::Transform {
                    child: b,
                    transform: tb,
                },
            ) if ta == tb => match ta.to_translate() {
                Some((dx, dy)) => {
                    let mut sub = Region::new();
                    a.diff(b, &mut sub);
                    // Re-adding rounds out, which widens fractional offsets
                    // by a pixel.
                    for rect in sub.rects() {
                        region.add_rect(rect.offset(dx, dy));
                    }
                }
                None => add_both(self, new, region),
            },
            (
                NodeKind::Clip { child: a, clip: ca },
                NodeKind::Clip { child: b, clip: cb },
            ) if ca == cb => {
                let mut sub = Region::new();
                a.diff(b, &mut sub);
                sub.intersect_rect(&ca.round_out());
                region.union(&sub);
            }
            (
                NodeKind::RoundedClip { child: a, clip: ca },
                NodeKind::RoundedClip { child: b, clip: cb },
            ) if ca == cb => {
                let mut sub = Region::new();
                a.diff(b, &mut sub);
                sub.intersect_rect(&ca.bounds.round_out());
                region.union(&sub);
            }
            (
                NodeKind::Opacity {
                    child: a,
                    opacity: oa,
                },
                NodeKind::Opacity {
                    child: b,
                    opacity: ob,
                },
            ) if oa == ob => a.diff(b, region),
            (
                NodeKind::ColorMatrix {
                    child: a,
                    matrix: ma,
                    offset: oa,
                },
                NodeKind::ColorMatrix {
                    child: b,
                    matrix: mb,
                    offset: ob,
                },
            ) if ma == mb && oa == ob => a.diff(b, region),
            (NodeKind::Debug { child: a, .. }, NodeKind::Debug { child: b, .. }) => {
                a.diff(b, region)
            }
            (
                NodeKind::Blur {
                    child: a,
                    radius: ra,
                },
                NodeKind::Blur {
                    child: b,
                    radius: rb,
                },
            ) if ra == rb => {
                let mut sub = Region::new();
                a.diff(b, &mut sub);
                let padding = super::blur_padding(ra / 2.0);
                for rect in sub.rects() {
                    region.add_rect(rect.inset(-padding));
                }
            }
            (
                NodeKind::CrossFade {
                    start: sa,
                    end: ea,
                    progress: pa,
                },
                NodeKind::CrossFade {
                    start: sb,
                    end: eb,
                    progress: pb,
                },
            ) if pa == pb => {
                sa.diff(sb, region);
                ea.diff(eb, region);
            }
            (a, b) if leaf_equal(a, b) => {}
            _ => add_both(self, new, region),
        }
    }
}

fn add_both(old: &RenderNode, new: &RenderNode, region: &mut Region) {
    region.add_rect(old.bounds().to_rect());
    region.add_rect(new.bounds().to_rect());
}

/// Equality of childless nodes by value. Textures compare by identity.
fn leaf_equal(a: &NodeKind, b: &NodeKind) -> bool {
    match (a, b) {
        (NodeKind::Color { rect: ra, color: ca }, NodeKind::Color { rect: rb, color: cb }) => {
            ra == rb && ca == cb
        }
        (
            NodeKind::LinearGradient {
                rect: ra,
                start: sa,
                end: ea,
                stops: pa,
            },
            NodeKind::LinearGradient {
                rect: rb,
                start: sb,
                end: eb,
                stops: pb,
            },
        ) => ra == rb && sa == sb && ea == eb && pa == pb,
        (
            NodeKind::Border {
                outline: oa,
                widths: wa,
                colors: ca,
            },
            NodeKind::Border {
                outline: ob,
                widths: wb,
                colors: cb,
            },
        ) => oa == ob && wa == wb && ca == cb,
        (
            NodeKind::Texture {
                rect: ra,
                texture: ta,
            },
            NodeKind::Texture {
                rect: rb,
                texture: tb,
            },
        ) => ra == rb && ta.ptr_eq(tb),
        (
            NodeKind::OutsetShadow {
                outline: oa,
                color: ca,
                dx: xa,
                dy: ya,
                spread: sa,
                blur_radius: ba,
            },
            NodeKind::OutsetShadow {
                outline: ob,
                color: cb,
                dx: xb,
                dy: yb,
                spread: sb,
                blur_radius: bb,
            },
        ) => oa == ob && ca == cb && xa == xb && ya == yb && sa == sb && ba == bb,
        _ => false,
    }
}

fn diff_children(old: &[RenderNode], new: &[RenderNode], region: &mut Region) {
    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a.ptr_eq(b))
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a.ptr_eq(b))
        .count();

    let old_rest = &old[prefix..old.len() - suffix];
    let new_rest = &new[prefix..new.len() - suffix];

    if old_rest.len() == new_rest.len() {
        for (a, b) in old_rest.iter().zip(new_rest) {
            a.diff(b, region);
        }
    } else {
        for node in old_rest.iter().chain(new_rest) {
            region.add_rect(node.bounds().to_rect());
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::color::Color;
    use crate::geometry::Rect;
    use crate::node::RenderNode;
    use crate::region::Region;
    use crate::transform::Transform;

    fn square(x: f32, color: Color) -> RenderNode {
        RenderNode::color(Rect::new(x, 0.0, 10.0, 10.0), color)
    }

    #[test]
    fn test_same_node_no_damage() {
        let node = square(0.0, Color::RED);
        let mut region = Region::new();
        node.diff(&node.clone(), &mut region);
        assert!(region.is_empty());
    }

    #[test]
    fn test_equal_leaves_no_damage() {
        let mut region = Region::new();
        square(0.0, Color::RED).diff(&square(0.0, Color::RED), &mut region);
        assert!(region.is_empty());
    }

    #[test]
    fn test_container_only_changed_child() {
        let shared = square(0.0, Color::RED);
        let old = RenderNode::container(vec![shared.clone(), square(20.0, Color::RED)]);
        let new = RenderNode::container(vec![shared, square(20.0, Color::BLUE)]);
        let mut region = Region::new();
        RenderNode::diff(&old, &new, &mut region);
        assert_eq!(region.rects(), &[Rect::new(20.0, 0.0, 10.0, 10.0)]);
    }

    #[test]
    fn test_translate_moves_damage() {
        let old = RenderNode::transform(square(0.0, Color::RED), Transform::translate(5.0, 5.0));
        let new = RenderNode::transform(square(0.0, Color::GREEN), Transform::translate(5.0, 5.0));
        let mut region = Region::new();
        old.diff(&new, &mut region);
        assert_eq!(region.extents(), Some(Rect::new(5.0, 5.0, 10.0, 10.0)));

        let old = RenderNode::transform(square(0.0, Color::RED), Transform::translate(0.5, 0.0));
        let new = RenderNode::transform(square(0.0, Color::GREEN), Transform::translate(0.5, 0.0));
        let mut region = Region::new();
        old.diff(&new, &mut region);
        assert_eq!(region.extents(), Some(Rect::new(0.0, 0.0, 11.0, 10.0)));
    }

    #[test]
    fn test_different_kinds_union_bounds() {
        let old = square(0.0, Color::RED);
        let new = RenderNode::opacity(square(30.0, Color::RED), 0.5);
        let mut region = Region::new();
        old.diff(&new, &mut region);
        assert_eq!(region.extents(), Some(Rect::new(0.0, 0.0, 40.0, 10.0)));
    }

    #[test]
    fn test_clip_restricts_damage() {
        let old = RenderNode::clip(square(0.0, Color::RED), Rect::new(0.0, 0.0, 5.0, 5.0));
        let new = RenderNode::clip(square(0.0, Color::BLUE), Rect::new(0.0, 0.0, 5.0, 5.0));
        let mut region = Region::new();
        old.diff(&new, &mut region);
        assert_eq!(region.rects(), &[Rect::new(0.0, 0.0, 5.0, 5.0)]);
    }
}
