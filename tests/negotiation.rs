//! Encoding negotiation tests with a scripted capability probe.

use vidfit::{CandidateProbe, EncodingCandidate, negotiate};

/// Answers "supported" only for candidates whose label is in the allow list.
struct ScriptedProbe {
    supported: Vec<&'static str>,
}

impl CandidateProbe for ScriptedProbe {
    fn supports(&self, candidate: &EncodingCandidate) -> bool {
        self.supported.contains(&candidate.label)
    }
}

#[test]
fn first_supported_candidate_wins() {
    let candidates = EncodingCandidate::defaults();
    let probe = ScriptedProbe {
        supported: vec!["video/mp4;codecs=avc1,mp4a", "video/webm;codecs=vp9,opus"],
    };

    let chosen = negotiate(&candidates, &probe).expect("a candidate is supported");
    assert_eq!(chosen.label, "video/mp4;codecs=avc1,mp4a");
}

#[test]
fn order_determines_preference() {
    let candidates = EncodingCandidate::defaults();
    // Only the second-priority candidate is available.
    let probe = ScriptedProbe {
        supported: vec!["video/webm;codecs=vp9,opus"],
    };

    let chosen = negotiate(&candidates, &probe).expect("a candidate is supported");
    assert_eq!(chosen.container, "webm");
    assert_eq!(chosen.label, "video/webm;codecs=vp9,opus");
}

#[test]
fn no_support_yields_none() {
    let candidates = EncodingCandidate::defaults();
    let probe = ScriptedProbe { supported: vec![] };
    assert!(negotiate(&candidates, &probe).is_none());
}

#[test]
fn empty_candidate_list_yields_none() {
    let probe = ScriptedProbe {
        supported: vec!["video/mp4;codecs=avc1,mp4a"],
    };
    assert!(negotiate(&[], &probe).is_none());
}

#[test]
fn default_order_is_mp4_then_vp9_then_vp8() {
    let labels: Vec<_> = EncodingCandidate::defaults()
        .into_iter()
        .map(|candidate| candidate.label)
        .collect();
    assert_eq!(
        labels,
        vec![
            "video/mp4;codecs=avc1,mp4a",
            "video/webm;codecs=vp9,opus",
            "video/webm;codecs=vp8,opus",
        ]
    );
}
