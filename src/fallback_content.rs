use crate::models::SlideRecord;
use crate::slide_normalizer::SlideRules;

pub const FALLBACK_LEN: usize = 13;

/// The pre-written deck used when generation fails or comes up short.
///
/// Every body is a title line, a `SUBHEADING:` line with an emoji marker and
/// six bullets. Only the first title mentions the subject.
pub fn fallback_slides(subject: &str) -> [String; FALLBACK_LEN] {
    [
        format!(
            "MASTERING {}\n🎯 SUBHEADING: Transform Your Yoga Journey\n\
             • Foundational pose suitable for beginners to advanced practitioners\n\
             • Builds comprehensive strength, balance and body awareness\n\
             • Perfect integration into daily morning or evening routines\n\
             • Creates profound connection between physical and mental states\n\
             • Significantly enhances overall posture and spinal health\n\
             • Recommended by yoga therapists for holistic wellness approach",
            subject.to_uppercase()
        ),
        "STEP-BY-STEP GUIDANCE\n📝 SUBHEADING: Perfect Your Alignment & Technique\n\
         • Start with proper foot placement and weight distribution\n\
         • Engage core muscles while maintaining relaxed breathing\n\
         • Align spine vertically with natural curvature maintained\n\
         • Position shoulders correctly away from ear position\n\
         • Coordinate subtle movements with breath patterns\n\
         • Maintain steady gaze and focused mental attention"
            .to_string(),
        "BREATHING TECHNIQUES\n🌬️ SUBHEADING: Master Conscious Breathing Patterns\n\
         • Practice deep diaphragmatic breathing throughout entire pose\n\
         • Coordinate inhalation with expansion and lifting movements\n\
         • Synchronize exhalation with grounding and stabilizing actions\n\
         • Maintain consistent, rhythmic breathing pattern always\n\
         • Incorporate advanced pranayama techniques when ready\n\
         • Use breath as anchor for mental focus and concentration"
            .to_string(),
        "PHYSICAL BENEFITS\n💪 SUBHEADING: Transform Your Body Completely\n\
         • Dramatically improves flexibility and joint mobility\n\
         • Significantly strengthens core and postural muscles\n\
         • Enhances overall body alignment and spinal health\n\
         • Increases blood circulation and oxygen flow\n\
         • Improves balance and proprioception significantly\n\
         • Reduces risk of injury and chronic pain"
            .to_string(),
        "MENTAL BENEFITS\n🧠 SUBHEADING: Achieve Mental Clarity & Peace\n\
         • Effectively reduces stress and anxiety levels\n\
         • Improves mental focus and concentration abilities\n\
         • Enhances mind-body connection and self-awareness\n\
         • Promotes emotional balance and stability\n\
         • Increases mindfulness and present moment awareness\n\
         • Supports overall mental health and wellbeing"
            .to_string(),
        "BEGINNER FRIENDLY\n🌟 SUBHEADING: Start Your Journey Confidently\n\
         • Simple modifications available for all ability levels\n\
         • Progressive learning path with clear milestones\n\
         • Patient, supportive approach to skill development\n\
         • Encouraging community and resources available\n\
         • Safe practice guidelines for new practitioners\n\
         • Celebrating small victories and progress"
            .to_string(),
        "ADVANCED VARIATIONS\n🚀 SUBHEADING: Challenge Your Practice Further\n\
         • Extended duration holds for strength building\n\
         • Complex variations for experienced practitioners\n\
         • Integration into flowing vinyasa sequences\n\
         • Advanced breathing and bandha applications\n\
         • Partner and assisted variations available\n\
         • Creative expressions and personal adaptations"
            .to_string(),
        "SAFETY PRECAUTIONS\n⚠️ SUBHEADING: Practice Smart & Stay Safe\n\
         • Always listen to your body's signals and limitations\n\
         • Avoid pushing beyond comfortable range of motion\n\
         • Proper warm-up and preparation are absolutely essential\n\
         • Consult healthcare providers for existing conditions\n\
         • Use props and modifications when necessary\n\
         • Practice under qualified guidance when starting"
            .to_string(),
        "DAILY PRACTICE ROUTINE\n📅 SUBHEADING: Build Consistent Habits\n\
         • Morning practice ideal for energy and focus\n\
         • 15-20 minutes daily for optimal results\n\
         • Gradual progression in difficulty and duration\n\
         • Regular self-assessment and adjustment\n\
         • Integration with other wellness practices\n\
         • Tracking progress and celebrating improvements"
            .to_string(),
        "TEACHING METHODOLOGY\n👨‍🏫 SUBHEADING: Share Knowledge Effectively\n\
         • Clear, concise verbal cues and instructions\n\
         • Comprehensive visual demonstrations and examples\n\
         • Individualized adjustments and modifications\n\
         • Positive, encouraging feedback and reinforcement\n\
         • Safe and supportive learning environment\n\
         • Progressive skill building approach"
            .to_string(),
        "PHILOSOPHICAL FOUNDATIONS\n📚 SUBHEADING: Deepen Your Understanding\n\
         • Ancient wisdom and modern science integration\n\
         • Holistic approach to health and wellness\n\
         • Connection to larger yoga philosophy system\n\
         • Spiritual dimensions of physical practice\n\
         • Ethical principles and lifestyle applications\n\
         • Personal transformation through consistent practice"
            .to_string(),
        "MODERN APPLICATIONS\n💼 SUBHEADING: Integrate Into Daily Life\n\
         • Office chair variations for workplace wellness\n\
         • Quick 5-minute break routines for busy schedules\n\
         • Effective stress management tool for modern life\n\
         • Family and group practice opportunities\n\
         • Community building through shared practice\n\
         • Lifestyle integration for sustainable benefits"
            .to_string(),
        "CONCLUSION & NEXT STEPS\n🎉 SUBHEADING: Continue Your Growth Journey\n\
         • Consistent daily practice is absolutely essential\n\
         • Progressive learning path with clear milestones\n\
         • Enjoy the process and celebrate each achievement\n\
         • Share knowledge and experience with others\n\
         • Explore related poses and deeper practices\n\
         • Lifetime journey of learning and growth"
            .to_string(),
    ]
}

/// The fallback deck parsed into slide records.
pub fn fallback_records(subject: &str, rules: &SlideRules) -> Vec<SlideRecord> {
    fallback_slides(subject)
        .iter()
        .map(|body| SlideRecord::from_body(body, rules))
        .collect()
}
